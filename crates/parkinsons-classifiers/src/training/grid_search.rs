//! Exhaustive hyper-parameter search scored by cross-validated accuracy.
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::config::{Gamma, ModelConfig, ModelType};
use crate::error::{PipelineError, Result};
use crate::training::cross_validation::{cross_validate, CVSplit, CvScores};

/// Candidate hyper-parameter settings for one model family.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub candidates: Vec<ModelType>,
}

impl ParamGrid {
    /// Default grids: C for logistic regression; C, kernel and gamma for the
    /// SVM; tree count, depth and split size for the forest. Settings that
    /// are not searched keep the values of `base`.
    pub fn default_for(base: &ModelType) -> Self {
        const C_VALUES: [f64; 4] = [0.1, 1.0, 10.0, 100.0];
        let mut candidates = Vec::new();
        match base {
            ModelType::LogisticRegression { max_iter, tol, .. } => {
                for c in C_VALUES {
                    candidates.push(ModelType::LogisticRegression {
                        c,
                        max_iter: *max_iter,
                        tol: *tol,
                    });
                }
            }
            ModelType::SVM {
                eps,
                polynomial_kernel_constant,
                polynomial_kernel_degree,
                ..
            } => {
                for c in C_VALUES {
                    for kernel in ["rbf", "linear"] {
                        for gamma in [Gamma::Scale, Gamma::Auto, Gamma::Value(0.1), Gamma::Value(0.01)] {
                            candidates.push(ModelType::SVM {
                                c,
                                kernel: kernel.to_string(),
                                gamma,
                                eps: *eps,
                                polynomial_kernel_constant: *polynomial_kernel_constant,
                                polynomial_kernel_degree: *polynomial_kernel_degree,
                            });
                        }
                    }
                }
            }
            ModelType::RandomForest { .. } => {
                for n_estimators in [50, 100, 200] {
                    for max_depth in [None, Some(10), Some(20), Some(30)] {
                        for min_samples_split in [2, 5, 10] {
                            candidates.push(ModelType::RandomForest {
                                n_estimators,
                                max_depth,
                                min_samples_split,
                            });
                        }
                    }
                }
            }
        }
        ParamGrid { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GridCandidate {
    pub params: String,
    pub mean_accuracy: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best: ModelConfig,
    pub best_scores: CvScores,
    pub candidates: Vec<GridCandidate>,
}

/// Cross-validate every candidate on the same folds and keep the one with
/// the highest mean accuracy (the earliest candidate wins ties). Candidates
/// that fail to fit are recorded and skipped.
pub fn grid_search(
    seed: u64,
    grid: &ParamGrid,
    x: &Array2<f64>,
    y: &Array1<usize>,
    folds: &[CVSplit],
) -> Result<GridSearchResult> {
    let mut best: Option<(ModelConfig, CvScores)> = None;
    let mut candidates = Vec::with_capacity(grid.len());

    for model_type in &grid.candidates {
        let config = ModelConfig::new(seed, model_type.clone());
        match cross_validate(&config, x, y, folds) {
            Ok(scores) => {
                candidates.push(GridCandidate {
                    params: model_type.describe(),
                    mean_accuracy: Some(scores.mean),
                    error: None,
                });
                let better = best.as_ref().map_or(true, |(_, b)| scores.mean > b.mean);
                if better {
                    best = Some((config, scores));
                }
            }
            Err(e) => {
                log::warn!("Grid candidate {} failed: {}", model_type.describe(), e);
                candidates.push(GridCandidate {
                    params: model_type.describe(),
                    mean_accuracy: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let (best, best_scores) = best.ok_or_else(|| {
        PipelineError::fit("grid_search", "every candidate failed to fit")
    })?;
    log::info!(
        "Best {} parameters: {} (CV accuracy {:.4})",
        best.name(),
        best.model_type.describe(),
        best_scores.mean
    );
    Ok(GridSearchResult {
        best,
        best_scores,
        candidates,
    })
}
