//! Isolation forest anomaly scores.
//!
//! Each tree isolates a random subsample by splitting on a random feature at
//! a uniform threshold between the node's minimum and maximum. Anomalies are
//! isolated after fewer splits, so their scores are closer to 1. Tree `i` is
//! seeded with `seed + i`, as in the random forest classifier.
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` points. Normalises path lengths and extends truncated leaves.
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(x: &Array2<f64>, rows: Vec<usize>, depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        if depth >= max_depth || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }
        // only features that still vary inside this node can split it
        let spans: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    (lo.min(x[(r, f)]), hi.max(x[(r, f)]))
                });
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();
        if spans.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, lo, hi) = spans[rng.gen_range(0..spans.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| x[(r, feature)] <= threshold);
        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::build(x, left, depth + 1, max_depth, rng)),
            right: Box::new(Node::build(x, right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, sample: ArrayView1<f64>, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.path_length(sample, depth + 1)
                } else {
                    right.path_length(sample, depth + 1)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_trees: usize,
    max_samples: usize,
    seed: u64,
    trees: Vec<Node>,
    sample_size: usize,
    n_features: usize,
}

impl IsolationForest {
    /// `max_samples` caps the subsample each tree is grown on (256 is the
    /// usual choice).
    pub fn new(n_trees: usize, max_samples: usize, seed: u64) -> Self {
        IsolationForest {
            n_trees,
            max_samples,
            seed,
            trees: Vec::new(),
            sample_size: 0,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if self.n_trees == 0 || self.max_samples == 0 {
            return Err(PipelineError::InvalidConfig(
                "isolation forest needs at least one tree and one sample per tree".to_string(),
            ));
        }
        if x.nrows() == 0 {
            return Err(PipelineError::InsufficientData(
                "isolation forest needs at least one row".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::fit("isolation_forest", "input contains non-finite values"));
        }

        let n_rows = x.nrows();
        let sample_size = self.max_samples.min(n_rows);
        let max_depth = ((sample_size as f64).log2().ceil() as usize).max(1);
        let seed = self.seed;

        self.trees = (0..self.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
                let rows = sample(&mut rng, n_rows, sample_size).into_vec();
                Node::build(x, rows, 0, max_depth, &mut rng)
            })
            .collect();
        self.sample_size = sample_size;
        self.n_features = x.ncols();
        log::trace!(
            "isolation forest fit {} trees on {} of {} rows (max depth {})",
            self.trees.len(),
            sample_size,
            n_rows,
            max_depth
        );
        Ok(())
    }

    /// Anomaly score per row, in `(0, 1]`. Higher is more anomalous.
    pub fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotTrained);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::DataFormat(format!(
                "isolation forest was fit on {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let normaliser = match average_path_length(self.sample_size) {
            c if c > 0.0 => c,
            _ => 1.0,
        };
        let n_trees = self.trees.len() as f64;
        Ok(x.outer_iter()
            .map(|row| {
                let mean_path = self.trees.iter().map(|t| t.path_length(row, 0)).sum::<f64>() / n_trees;
                2f64.powf(-mean_path / normaliser)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_length_normaliser() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2 * (ln 255 + gamma) - 2 * 255 / 256
        assert!((average_path_length(256) - 10.2448).abs() < 1e-3);
    }

    #[test]
    fn isolated_point_scores_highest() {
        let mut values: Vec<f64> = (0..100).map(|i| (i % 10) as f64 * 0.1).collect();
        values.push(50.0);
        let x = Array2::from_shape_vec((101, 1), values).unwrap();

        let mut forest = IsolationForest::new(100, 256, 42);
        forest.fit(&x).unwrap();
        let scores = forest.score_samples(&x).unwrap();
        let max_inlier = scores.iter().take(100).cloned().fold(f64::MIN, f64::max);
        assert!(scores[100] > max_inlier);
        assert!(scores.iter().all(|&s| s > 0.0 && s <= 1.0));
    }

    #[test]
    fn same_seed_same_scores() {
        let x = Array2::from_shape_fn((60, 2), |(r, c)| ((r * 7 + c * 3) % 11) as f64);
        let mut a = IsolationForest::new(30, 32, 9);
        let mut b = IsolationForest::new(30, 32, 9);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.score_samples(&x).unwrap(), b.score_samples(&x).unwrap());
    }
}
