use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Configuration for one classifier: a seed plus the model family and its
/// hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub seed: u64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    LogisticRegression {
        /// Inverse of the L2 regularization strength.
        c: f64,
        max_iter: usize,
        tol: f64,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
    },
    SVM {
        c: f64,
        /// One of `rbf`, `linear` or `poly`.
        kernel: String,
        gamma: Gamma,
        eps: f64,
        polynomial_kernel_constant: f64,
        polynomial_kernel_degree: f64,
    },
}

/// RBF kernel coefficient. `Scale` is `1 / (n_features * X.var())`, `Auto`
/// is `1 / n_features`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    Scale,
    Auto,
    Value(f64),
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gamma::Scale => write!(f, "scale"),
            Gamma::Auto => write!(f, "auto"),
            Gamma::Value(v) => write!(f, "{}", v),
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::default_random_forest()
    }
}

impl ModelType {
    pub fn default_logistic() -> Self {
        ModelType::LogisticRegression {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn default_random_forest() -> Self {
        ModelType::RandomForest {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
        }
    }

    pub fn default_svm() -> Self {
        ModelType::SVM {
            c: 1.0,
            kernel: "rbf".to_string(),
            gamma: Gamma::Scale,
            eps: 1e-3,
            polynomial_kernel_constant: 1.0,
            polynomial_kernel_degree: 3.0,
        }
    }

    /// Stable identifier used as the key for results and reports.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression { .. } => "logistic_regression",
            ModelType::RandomForest { .. } => "random_forest",
            ModelType::SVM { .. } => "svm",
        }
    }

    /// Short human readable description of the hyper-parameters.
    pub fn describe(&self) -> String {
        match self {
            ModelType::LogisticRegression { c, .. } => format!("C={}", c),
            ModelType::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
            } => format!(
                "n_estimators={}, max_depth={}, min_samples_split={}",
                n_estimators,
                max_depth.map_or("None".to_string(), |d| d.to_string()),
                min_samples_split
            ),
            ModelType::SVM {
                c, kernel, gamma, ..
            } => format!("C={}, kernel={}, gamma={}", c, kernel, gamma),
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic" | "logistic_regression" => Ok(ModelType::default_logistic()),
            "rf" | "random_forest" => Ok(ModelType::default_random_forest()),
            "svm" => Ok(ModelType::default_svm()),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: logistic, random_forest, svm",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(seed: u64, model_type: ModelType) -> Self {
        Self { seed, model_type }
    }

    pub fn name(&self) -> &'static str {
        self.model_type.name()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            model_type: ModelType::default(),
        }
    }
}

/// How rows with missing feature values are handled before splitting.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    #[default]
    Drop,
    FillMean,
    FillMedian,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    #[default]
    Standard,
    MinMax,
    Robust,
    None,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    #[default]
    RandomForestImportance,
    KBest,
    Rfe,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Iqr,
    Zscore,
    IsolationForest,
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::Iqr => write!(f, "iqr"),
            OutlierMethod::Zscore => write!(f, "zscore"),
            OutlierMethod::IsolationForest => write!(f, "isolation_forest"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutlierConfig {
    pub methods: Vec<OutlierMethod>,
    pub iqr_multiplier: f64,
    pub zscore_threshold: f64,
    /// Expected share of outliers for the isolation forest.
    pub contamination: f64,
    pub isolation_trees: usize,
    pub seed: u64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        OutlierConfig {
            methods: vec![OutlierMethod::Iqr, OutlierMethod::Zscore],
            iqr_multiplier: 1.5,
            zscore_threshold: 3.0,
            contamination: 0.1,
            isolation_trees: 100,
            seed: 42,
        }
    }
}

/// Settings for a complete train / evaluate run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub seed: u64,
    pub test_size: f64,
    pub stratify: bool,
    pub cv_folds: usize,
    pub missing_values: MissingValueStrategy,
    pub scaling: ScalingMethod,
    pub feature_selection: SelectionMethod,
    pub n_features: usize,
    /// Trees used when ranking features by forest importance.
    pub selection_trees: usize,
    pub grid_search: bool,
    pub models: Vec<ModelConfig>,
    pub outliers: OutlierConfig,
    pub min_rows: usize,
    /// When set, HTML reports are written below this directory.
    pub output_dir: Option<PathBuf>,
    /// Number of previously installed pipelines the registry keeps.
    pub history_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let seed = 42;
        PipelineConfig {
            seed,
            test_size: 0.2,
            stratify: true,
            cv_folds: 5,
            missing_values: MissingValueStrategy::default(),
            scaling: ScalingMethod::default(),
            feature_selection: SelectionMethod::default(),
            n_features: 15,
            selection_trees: 100,
            grid_search: false,
            models: vec![
                ModelConfig::new(seed, ModelType::default_logistic()),
                ModelConfig::new(seed, ModelType::default_random_forest()),
                ModelConfig::new(seed, ModelType::default_svm()),
            ],
            outliers: OutlierConfig::default(),
            min_rows: 2,
            output_dir: None,
            history_depth: 0,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Fields that are missing or
    /// hold invalid values fall back to their defaults with a warning.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_json = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&config_json)
    }

    pub fn from_json_str(config_json: &str) -> Result<Self> {
        let partial: serde_json::Value = serde_json::from_str(config_json)?;
        let mut config = PipelineConfig::default();

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field),
                            config.$field
                        );
                    }
                } else {
                    log::debug!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field),
                        config.$field
                    );
                }
            };
        }

        load_or_default!(seed);
        // default models follow the top-level seed unless `models` is given
        for model in &mut config.models {
            model.seed = config.seed;
        }
        load_or_default!(test_size);
        load_or_default!(stratify);
        load_or_default!(cv_folds);
        load_or_default!(missing_values);
        load_or_default!(scaling);
        load_or_default!(feature_selection);
        load_or_default!(n_features);
        load_or_default!(selection_trees);
        load_or_default!(grid_search);
        load_or_default!(models);
        load_or_default!(outliers);
        if partial.get("outliers").and_then(|o| o.get("seed")).is_none() {
            config.outliers.seed = config.seed;
        }
        load_or_default!(min_rows);
        load_or_default!(output_dir);
        load_or_default!(history_depth);

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.n_features == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_features must be at least 1".to_string(),
            ));
        }
        if self.models.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one model must be configured".to_string(),
            ));
        }
        if !(self.outliers.contamination > 0.0 && self.outliers.contamination <= 0.5) {
            return Err(PipelineError::InvalidConfig(format!(
                "outliers.contamination must be in (0, 0.5], got {}",
                self.outliers.contamination
            )));
        }
        Ok(())
    }
}
