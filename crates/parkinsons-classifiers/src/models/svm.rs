use linfa::dataset::Pr;
use linfa::traits::Predict;
use linfa::Dataset;
use linfa_svm::Svm;
use linfa_svm::SvmParams;
use ndarray::{Array1, Array2};

use crate::config::{Gamma, ModelConfig, ModelType};
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::{check_fit_input, check_predict_input, ClassifierModel};

/// Support vector classifier backed by `linfa-svm`, with Platt-scaled
/// probabilities.
#[derive(Debug)]
pub struct SVMClassifier {
    model: Option<Svm<f64, Pr>>,
    params: ModelConfig,
    n_features: usize,
}

impl SVMClassifier {
    pub fn new(params: ModelConfig) -> Self {
        SVMClassifier {
            model: None,
            params,
            n_features: 0,
        }
    }
}

/// Resolve the RBF coefficient for a training matrix.
pub fn resolve_gamma(gamma: Gamma, x: &Array2<f64>) -> f64 {
    let n_features = x.ncols().max(1) as f64;
    match gamma {
        Gamma::Scale => {
            let var = x.var(0.0);
            if var > 0.0 {
                1.0 / (n_features * var)
            } else {
                1.0
            }
        }
        Gamma::Auto => 1.0 / n_features,
        Gamma::Value(v) => v,
    }
}

impl ClassifierModel for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;

        let ModelType::SVM {
            c,
            kernel,
            gamma,
            eps,
            polynomial_kernel_constant,
            polynomial_kernel_degree,
        } = &self.params.model_type
        else {
            return Err(PipelineError::InvalidConfig(format!(
                "Expected ModelType::SVM but got {}",
                self.params.name()
            )));
        };
        if *c <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!("C must be positive, got {}", c)));
        }

        // Convert y to [true, false] for binary classification
        let targets = y.mapv(|l| l == 1);
        let dataset = Dataset::new(x.to_owned(), targets);

        let mut model: SvmParams<f64, Pr> = Svm::<f64, Pr>::params().eps(*eps).pos_neg_weights(*c, *c);

        // linfa's gaussian kernel is exp(-||a - b||^2 / eps), so eps = 1 / gamma
        model = match kernel.as_str() {
            "linear" => model.linear_kernel(),
            "rbf" | "gauss" => {
                let g = resolve_gamma(*gamma, x);
                if !(g.is_finite() && g > 0.0) {
                    return Err(PipelineError::InvalidConfig(format!("gamma must be positive, got {}", g)));
                }
                model.gaussian_kernel(1.0 / g)
            }
            "poly" => model.polynomial_kernel(*polynomial_kernel_constant, *polynomial_kernel_degree),
            _ => {
                return Err(PipelineError::InvalidConfig(format!(
                    "Unsupported kernel type: {}. Valid options are: linear, rbf, poly",
                    kernel
                )))
            }
        };

        let fitted = <SvmParams<f64, Pr> as linfa::traits::Fit<_, _, _>>::fit(&model, &dataset)
            .map_err(|e| PipelineError::fit(self.name(), e.to_string()))?;
        log::trace!("{} fit with {} support vectors", self.name(), fitted.nsupport());

        self.n_features = x.ncols();
        self.model = Some(fitted);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(PipelineError::ModelNotTrained)?;
        check_predict_input(self.n_features, x)?;
        let predictions = model.predict(x.to_owned());
        Ok(predictions.targets().iter().map(|&p| f64::from(*p)).collect())
    }

    fn name(&self) -> &str {
        "svm"
    }
}
