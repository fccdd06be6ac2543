//! Binary CART classification tree with Gini impurity.
//!
//! Used as the base learner of the random forest. Leaves store the fraction
//! of class-1 samples that reached them, so `predict_proba` is a direct
//! lookup.
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::index::sample;

use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::check_predict_input;

#[derive(Debug, Clone)]
pub enum TreeNode {
    Leaf {
        /// Fraction of class-1 samples in the leaf.
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features drawn at random for each split; all features when `None`.
    pub max_features: Option<usize>,
    n_features: usize,
    /// Unnormalized total impurity decrease per feature.
    impurity_decrease: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        DecisionTree {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            n_features: 0,
            impurity_decrease: Vec::new(),
        }
    }
}

fn gini(n_pos: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let p = n_pos / n;
    2.0 * p * (1.0 - p)
}

struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Weighted impurity decrease, `n * (parent - weighted children)`.
    decrease: f64,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit on the rows of `x` listed in `indices`. Indices may repeat, which
    /// is how bootstrap samples are passed in without copying the matrix.
    pub fn fit_indices(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Result<()> {
        if indices.is_empty() {
            return Err(PipelineError::fit("decision_tree", "no samples to fit"));
        }
        self.n_features = x.ncols();
        let mut decrease = vec![0.0; self.n_features];
        let mut idx = indices.to_vec();
        self.root = Some(self.build_tree(x, y, &mut idx, 0, rng, &mut decrease));
        self.impurity_decrease = decrease;
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, rng: &mut StdRng) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices, rng)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &mut [usize],
        depth: usize,
        rng: &mut StdRng,
        decrease: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let n_pos = indices.iter().filter(|&&i| y[i] == 1).count();
        let leaf = TreeNode::Leaf {
            value: n_pos as f64 / n_samples as f64,
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.map_or(false, |d| depth >= d)
            || n_pos == 0
            || n_pos == n_samples;
        if should_stop {
            return leaf;
        }

        let Some(best) = self.find_best_split(x, y, indices, n_pos, rng) else {
            return leaf;
        };
        decrease[best.feature_idx] += best.decrease;

        let mid = partition(indices, |i| x[(i, best.feature_idx)] <= best.threshold);
        let (left_idx, right_idx) = indices.split_at_mut(mid);
        let left = Box::new(self.build_tree(x, y, left_idx, depth + 1, rng, decrease));
        let right = Box::new(self.build_tree(x, y, right_idx, depth + 1, rng, decrease));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &[usize],
        n_pos: usize,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = indices.len() as f64;
        let parent = gini(n_pos as f64, n);
        let n_try = self.max_features.unwrap_or(self.n_features).clamp(1, self.n_features);
        let mut features = sample(rng, self.n_features, n_try).into_vec();
        features.sort_unstable();

        let mut best: Option<SplitCandidate> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(indices.len());
        for feature_idx in features {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (x[(i, feature_idx)], y[i])));
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            // sweep thresholds between distinct consecutive values
            let mut left_n = 0.0;
            let mut left_pos = 0.0;
            for k in 0..sorted.len() - 1 {
                left_n += 1.0;
                left_pos += sorted[k].1 as f64;
                if sorted[k].0 == sorted[k + 1].0 {
                    continue;
                }
                let right_n = n - left_n;
                let right_pos = n_pos as f64 - left_pos;
                let weighted = (left_n * gini(left_pos, left_n) + right_n * gini(right_pos, right_n)) / n;
                let decrease = n * (parent - weighted);
                if decrease > best.as_ref().map_or(1e-12, |b| b.decrease) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (sorted[k].0 + sorted[k + 1].0) / 2.0,
                        decrease,
                    });
                }
            }
        }
        best
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotTrained)?;
        check_predict_input(self.n_features, x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => return *value,
                        TreeNode::Split {
                            feature_idx,
                            threshold,
                            left,
                            right,
                            ..
                        } => {
                            node = if row[*feature_idx] <= *threshold {
                                &**left
                            } else {
                                &**right
                            };
                        }
                    }
                }
            })
            .collect())
    }

    /// Impurity-decrease importances normalized to sum to 1 (all zeros for
    /// a tree that never split).
    pub fn feature_importances(&self) -> Array1<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        let imp = Array1::from_vec(self.impurity_decrease.clone());
        if total > 0.0 {
            imp / total
        } else {
            imp
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

/// Reorder `items` so every element satisfying `pred` comes first; returns
/// the number of such elements.
fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for k in 0..items.len() {
        if pred(items[k]) {
            items.swap(mid, k);
            mid += 1;
        }
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn learns_threshold_on_informative_feature() {
        let x = array![[0.0, 5.0], [1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0], [5.0, 5.0]];
        let y = array![0, 0, 0, 1, 1, 1];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y, &mut StdRng::seed_from_u64(0)).unwrap();
        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.to_vec(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let imp = tree.feature_importances();
        assert!((imp[0] - 1.0).abs() < 1e-12);
        assert_eq!(imp[1], 0.0);
    }

    #[test]
    fn narrower_input_is_rejected() {
        let x = array![[0.0, 5.0], [1.0, 5.0], [2.0, 6.0], [3.0, 6.0]];
        let y = array![0, 0, 1, 1];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!(matches!(
            tree.predict_proba(&array![[1.0], [2.0]]),
            Err(PipelineError::DataFormat(_))
        ));
    }

    #[test]
    fn max_depth_limits_growth() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0, 1, 0, 1, 0, 1];
        let mut tree = DecisionTree::new().with_max_depth(Some(1));
        tree.fit(&x, &y, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!(tree.depth() <= 1);
    }
}
