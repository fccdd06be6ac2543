//! Trains every configured classifier independently.
use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::models::{build_model, ClassifierModel};
use crate::training::cross_validation::{cross_validate, CVSplit, CvScores, StratifiedKFold};
use crate::training::grid_search::{grid_search, GridCandidate, ParamGrid};

#[derive(Debug, Clone, Copy)]
pub struct TrainingOptions {
    pub cv_folds: usize,
    pub seed: u64,
    pub grid_search: bool,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        TrainingOptions {
            cv_folds: 5,
            seed: 42,
            grid_search: false,
        }
    }
}

/// A classifier fit on the full training split, with the configuration
/// actually used and its cross-validation scores.
#[derive(Debug)]
pub struct TrainedModel {
    pub config: ModelConfig,
    pub model: Box<dyn ClassifierModel>,
    pub cv: CvScores,
    pub grid: Option<Vec<GridCandidate>>,
}

impl TrainedModel {
    pub fn name(&self) -> &'static str {
        self.config.name()
    }
}

/// Cross-validate (or grid-search) `config` and refit it on all of `x`.
pub fn train_model(
    config: &ModelConfig,
    x: &Array2<f64>,
    y: &Array1<usize>,
    folds: &[CVSplit],
    options: &TrainingOptions,
) -> Result<TrainedModel> {
    let (config, cv, grid) = if options.grid_search {
        let grid = ParamGrid::default_for(&config.model_type);
        log::info!("Grid search over {} {} candidates", grid.len(), config.name());
        let result = grid_search(config.seed, &grid, x, y, folds)?;
        (result.best, result.best_scores, Some(result.candidates))
    } else {
        let cv = cross_validate(config, x, y, folds)?;
        (config.clone(), cv, None)
    };

    let mut model = build_model(&config);
    model.fit(x, y)?;
    log::info!(
        "{}: CV accuracy {:.4} (+/- {:.4})",
        config.name(),
        cv.mean,
        cv.std * 2.0
    );
    Ok(TrainedModel {
        config,
        model,
        cv,
        grid,
    })
}

/// Train every configuration in parallel on shared folds. Each entry holds
/// its own outcome so one failing model never prevents the others.
pub fn train_models(
    configs: &[ModelConfig],
    x: &Array2<f64>,
    y: &Array1<usize>,
    options: &TrainingOptions,
) -> Result<Vec<(String, Result<TrainedModel>)>> {
    let folds = StratifiedKFold::new(options.cv_folds, options.seed).split(y)?;
    Ok(configs
        .par_iter()
        .map(|config| {
            let outcome = train_model(config, x, y, &folds, options);
            if let Err(e) = &outcome {
                log::error!("Training {} failed: {}", config.name(), e);
            }
            (config.name().to_string(), outcome)
        })
        .collect())
}
