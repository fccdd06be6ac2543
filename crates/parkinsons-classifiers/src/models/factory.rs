use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::logistic::LogisticRegressionClassifier;
use crate::models::random_forest::RandomForestClassifier;
use crate::models::svm::SVMClassifier;

/// Build an unfitted, boxed classifier from a `ModelConfig`.
pub fn build_model(params: &ModelConfig) -> Box<dyn ClassifierModel> {
    match params.model_type {
        ModelType::LogisticRegression { .. } => {
            Box::new(LogisticRegressionClassifier::new(params.clone()))
        }
        ModelType::RandomForest { .. } => Box::new(RandomForestClassifier::new(params.clone())),
        ModelType::SVM { .. } => Box::new(SVMClassifier::new(params.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn factory_names_match_config() {
        for kind in ["logistic", "random_forest", "svm"] {
            let config = ModelConfig::new(1, ModelType::from_str(kind).unwrap());
            let model = build_model(&config);
            assert_eq!(model.name(), config.name());
        }
    }
}
