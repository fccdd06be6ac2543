//! Random forest of bootstrap-sampled CART trees.
//!
//! Each tree gets its own `StdRng` seeded with `seed + tree_index`, so the
//! forest is identical for a given seed no matter how rayon schedules the
//! trees.
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::{ModelConfig, ModelType};
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::{check_fit_input, check_predict_input, ClassifierModel};
use crate::models::decision_tree::DecisionTree;

#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    params: ModelConfig,
    trees: Vec<DecisionTree>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn new(params: ModelConfig) -> Self {
        RandomForestClassifier {
            params,
            trees: Vec::new(),
            feature_importances: None,
            n_features: 0,
        }
    }

    /// `sqrt(n_features)` rounded down, at least one.
    fn compute_max_features(n_features: usize) -> usize {
        ((n_features as f64).sqrt().floor() as usize).max(1)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::<f64>::zeros(self.n_features);
        let mut contributing = 0usize;
        for tree in &self.trees {
            let imp = tree.feature_importances();
            if imp.sum() > 0.0 {
                total += &imp;
                contributing += 1;
            }
        }
        if contributing > 0 {
            total /= contributing as f64;
            let sum = total.sum();
            if sum > 0.0 {
                total /= sum;
            }
        }
        self.feature_importances = Some(total);
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;
        let (n_estimators, max_depth, min_samples_split) = match self.params.model_type {
            ModelType::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
            } => (n_estimators, max_depth, min_samples_split),
            _ => {
                return Err(PipelineError::InvalidConfig(format!(
                    "Expected ModelType::RandomForest but got {}",
                    self.params.name()
                )))
            }
        };
        if n_estimators == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        let max_features = Self::compute_max_features(self.n_features);
        let base_seed = self.params.seed;

        let trees: Result<Vec<DecisionTree>> = (0..n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample_indices: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut tree = DecisionTree::new()
                    .with_max_depth(max_depth)
                    .with_min_samples_split(min_samples_split)
                    .with_max_features(Some(max_features));
                tree.fit_indices(x, y, &sample_indices, &mut rng)?;
                Ok(tree)
            })
            .collect();
        self.trees = trees?;
        self.compute_feature_importances();

        log::trace!(
            "{} fit {} trees (max_features={})",
            self.name(),
            self.trees.len(),
            max_features
        );
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotTrained);
        }
        check_predict_input(self.n_features, x)?;
        let per_tree: Result<Vec<Array1<f64>>> =
            self.trees.par_iter().map(|t| t.predict_proba(x)).collect();
        let per_tree = per_tree?;
        let mut mean = Array1::<f64>::zeros(x.nrows());
        for p in &per_tree {
            mean += p;
        }
        Ok(mean / per_tree.len() as f64)
    }

    fn name(&self) -> &str {
        "random_forest"
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}
