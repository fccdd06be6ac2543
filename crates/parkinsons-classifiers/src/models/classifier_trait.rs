use ndarray::{Array1, Array2};

use crate::error::{PipelineError, Result};

/// Contract shared by every classifier in the crate.
///
/// Labels use 0 (healthy) and 1 (Parkinson's). Implementations must be
/// `Send + Sync` so fitted models can be shared across threads behind an
/// `Arc` and trained in parallel.
pub trait ClassifierModel: Send + Sync + std::fmt::Debug {
    /// Fit the model on rows of `x` with binary labels `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()>;

    /// Probability of class 1 for every row of `x`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard class labels at a 0.5 probability threshold.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(self.predict_proba(x)?.mapv(|p| usize::from(p >= 0.5)))
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }

    /// Per-feature importances, for models that expose them.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Shared shape checks for `fit`.
pub(crate) fn check_fit_input(name: &str, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(PipelineError::fit(name, "empty training matrix"));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::fit(
            name,
            format!("{} rows but {} labels", x.nrows(), y.len()),
        ));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::fit(name, "training matrix contains non-finite values"));
    }
    Ok(())
}

/// Shared shape checks for prediction.
pub(crate) fn check_predict_input(n_features: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != n_features {
        return Err(PipelineError::DataFormat(format!(
            "model was fit on {} features but input has {}",
            n_features,
            x.ncols()
        )));
    }
    Ok(())
}
