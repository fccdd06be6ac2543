//! Model-based feature ranking: random forest importance and recursive
//! feature elimination.
use ndarray::{Array1, Array2, Axis};

use crate::config::{ModelConfig, ModelType};
use crate::error::{PipelineError, Result};
use crate::models::random_forest::RandomForestClassifier;
use crate::models::ClassifierModel;

/// Mean impurity-decrease importances of a forest fit on `x`, `y`.
pub fn random_forest_importance(
    x: &Array2<f64>,
    y: &Array1<usize>,
    n_trees: usize,
    seed: u64,
) -> Result<Array1<f64>> {
    let config = ModelConfig::new(
        seed,
        ModelType::RandomForest {
            n_estimators: n_trees,
            max_depth: None,
            min_samples_split: 2,
        },
    );
    let mut forest = RandomForestClassifier::new(config);
    forest.fit(x, y)?;
    forest
        .feature_importances()
        .ok_or_else(|| PipelineError::fit("random_forest", "no feature importances after fit"))
}

/// Column indices ordered by descending score; ties keep column order.
pub fn rank_descending(scores: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Top `k` columns by forest importance as `(column, importance)`.
pub fn select_by_importance(
    x: &Array2<f64>,
    y: &Array1<usize>,
    k: usize,
    n_trees: usize,
    seed: u64,
) -> Result<Vec<(usize, f64)>> {
    let importances = random_forest_importance(x, y, n_trees, seed)?;
    Ok(rank_descending(&importances)
        .into_iter()
        .take(k)
        .map(|c| (c, importances[c]))
        .collect())
}

/// Recursive feature elimination: refit the forest and drop the least
/// important remaining column until `k` are left.
pub fn recursive_feature_elimination(
    x: &Array2<f64>,
    y: &Array1<usize>,
    k: usize,
    n_trees: usize,
    seed: u64,
) -> Result<Vec<(usize, f64)>> {
    let k = k.clamp(1, x.ncols().max(1));
    let mut remaining: Vec<usize> = (0..x.ncols()).collect();

    loop {
        let subset = x.select(Axis(1), &remaining);
        let importances = random_forest_importance(&subset, y, n_trees, seed)?;
        if remaining.len() <= k {
            return Ok(rank_descending(&importances)
                .into_iter()
                .map(|pos| (remaining[pos], importances[pos]))
                .collect());
        }
        // first position holding the minimum importance
        let weakest = importances
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |acc, (pos, &v)| if v < acc.1 { (pos, v) } else { acc })
            .0;
        log::trace!("RFE dropping column {} ({} remain)", remaining[weakest], remaining.len() - 1);
        remaining.remove(weakest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<usize>) {
        let n = 60;
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let label = usize::from(i % 3 == 0);
            let signal = label as f64 * 2.0 + (i as f64 * 0.13).sin() * 0.3;
            rows.extend_from_slice(&[(i as f64 * 1.7).cos(), signal, (i as f64 * 0.61).sin()]);
            labels.push(label);
        }
        (Array2::from_shape_vec((n, 3), rows).unwrap(), Array1::from_vec(labels))
    }

    #[test]
    fn importance_ranks_signal_first() {
        let (x, y) = data();
        let top = select_by_importance(&x, &y, 1, 30, 5).unwrap();
        assert_eq!(top[0].0, 1);
    }

    #[test]
    fn rfe_keeps_requested_count() {
        let (x, y) = data();
        let kept = recursive_feature_elimination(&x, &y, 2, 20, 5).unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|&(c, _)| c == 1));
    }
}
