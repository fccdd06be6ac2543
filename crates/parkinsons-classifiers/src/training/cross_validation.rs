//! Stratified k-fold cross-validation.
use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::evaluation::accuracy;
use crate::models::build_model;
use crate::stats::{mean, std_dev};

/// A single train/validation split.
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Per-fold accuracies with their mean and (population) standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScores {
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvScores {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let m = mean(&scores);
        let s = if scores.is_empty() { f64::NAN } else { std_dev(&scores, 0) };
        CvScores { scores, mean: m, std: s }
    }
}

/// Shuffled stratified k-fold splitter. Each class is shuffled with the
/// seed and dealt round-robin over the folds, so every fold keeps the
/// class ratio of the whole set.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        StratifiedKFold { n_splits, seed }
    }

    pub fn split(&self, y: &Array1<usize>) -> Result<Vec<CVSplit>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(PipelineError::InvalidConfig(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if y.len() < k {
            return Err(PipelineError::InsufficientData(format!(
                "n_samples ({}) must be >= n_splits ({})",
                y.len(),
                k
            )));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }
        if let Some((class, rows)) = by_class.iter().find(|(_, rows)| rows.len() < k) {
            log::warn!(
                "The least populated class ({}) has only {} members, which is less than n_splits={}",
                class,
                rows.len(),
                k
            );
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut fold_of = vec![0usize; y.len()];
        let mut offset = 0;
        for rows in by_class.values_mut() {
            rows.shuffle(&mut rng);
            for (i, &row) in rows.iter().enumerate() {
                fold_of[row] = (offset + i) % k;
            }
            offset += rows.len();
        }

        Ok((0..k)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| fold_of[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

/// Fit a fresh model per fold and score its accuracy on the held-out fold.
pub fn cross_validate(
    config: &ModelConfig,
    x: &Array2<f64>,
    y: &Array1<usize>,
    folds: &[CVSplit],
) -> Result<CvScores> {
    let mut scores = Vec::with_capacity(folds.len());
    for fold in folds {
        let x_train = x.select(Axis(0), &fold.train_indices);
        let y_train = y.select(Axis(0), &fold.train_indices);
        let x_val = x.select(Axis(0), &fold.test_indices);
        let y_val = y.select(Axis(0), &fold.test_indices);

        let mut model = build_model(config);
        model.fit(&x_train, &y_train)?;
        let predicted = model.predict(&x_val)?;
        let score = accuracy(&y_val, &predicted);
        log::trace!("{} fold {}: accuracy {:.4}", config.name(), fold.fold_idx, score);
        scores.push(score);
    }
    Ok(CvScores::from_scores(scores))
}
