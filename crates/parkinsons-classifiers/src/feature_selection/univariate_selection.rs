//! Univariate feature scoring following scikit-learn's API.
//!
//! For a binary target the regression F-statistic computed from Pearson's r
//! equals the one-way ANOVA F-statistic between the two classes, so
//! `f_regression` doubles as the classification score used by `SelectKBest`.
//!
//! See: https://scikit-learn.org/stable/modules/feature_selection.html#univariate-feature-selection

use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::{PipelineError, Result};

/// Compute row-wise (squared) Euclidean norms of a 2D array.
pub fn row_norms<S>(x: &ArrayBase<S, Ix2>, squared: bool) -> Array1<f64>
where
    S: Data<Elem = f64>,
{
    x.axis_iter(Axis(0))
        .map(|row| {
            let sum_of_squares: f64 = row.iter().map(|&val| val.powi(2)).sum();
            if squared {
                sum_of_squares
            } else {
                sum_of_squares.sqrt()
            }
        })
        .collect()
}

/// Pearson's r between each column of `x` and `y`.
///
/// With `force_finite`, undefined coefficients (constant columns) are
/// reported as 0.
pub fn r_regression(x: &Array2<f64>, y: &Array1<f64>, force_finite: bool) -> Array1<f64> {
    let n_samples = x.nrows() as f64;
    let y_mean = y.mean().unwrap_or(0.0);
    let y_centered = y - y_mean;

    let x_means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    // centered column norms via moments
    let x_squared_norms = row_norms(&x.t(), true);
    let x_norms = (&x_squared_norms - &(x_means.mapv(|m| m.powi(2)) * n_samples))
        .mapv(|v| v.max(0.0).sqrt());

    let mut correlation_coefficient: Array1<f64> = x
        .columns()
        .into_iter()
        .zip(x_means.iter())
        .map(|(col, &m)| col.mapv(|v| v - m).dot(&y_centered))
        .collect();

    let y_norm = y_centered.dot(&y_centered).sqrt();
    correlation_coefficient /= &x_norms;
    correlation_coefficient /= y_norm;

    if force_finite {
        correlation_coefficient.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
    }
    correlation_coefficient
}

/// Univariate F-test of each column against `y`, returning
/// `(f_statistic, p_values)`.
pub fn f_regression(
    x: &Array2<f64>,
    y: &Array1<f64>,
    force_finite: bool,
) -> Result<(Array1<f64>, Array1<f64>)> {
    if x.nrows() < 3 {
        return Err(PipelineError::InsufficientData(format!(
            "F-test needs at least 3 samples, got {}",
            x.nrows()
        )));
    }
    let correlation_coefficient = r_regression(x, y, force_finite);
    let deg_of_freedom = y.len() as f64 - 2.0;

    let corr_coef_squared = correlation_coefficient.mapv(|r| r.powi(2).min(1.0));
    let mut f_statistic = corr_coef_squared.mapv(|r2| r2 / (1.0 - r2) * deg_of_freedom);

    let f_dist = FisherSnedecor::new(1.0, deg_of_freedom)
        .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
    let mut p_values = f_statistic.mapv(|f| if f.is_finite() { f_dist.sf(f) } else { f64::NAN });

    if force_finite {
        for (f, p) in f_statistic.iter_mut().zip(p_values.iter_mut()) {
            if f.is_infinite() {
                *f = f64::MAX;
                *p = 0.0;
            } else if f.is_nan() {
                *f = 0.0;
                *p = 1.0;
            }
        }
    }

    Ok((f_statistic, p_values))
}

/// Selects the k features with the highest F-scores.
pub struct SelectKBest {
    /// The number of top features to select.
    k: usize,
}

impl SelectKBest {
    pub fn new(k: usize) -> Self {
        SelectKBest { k }
    }

    /// Score every feature and return `(column, F-score)` for the k best,
    /// highest score first. Ties keep column order.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<Vec<(usize, f64)>> {
        let y = y.mapv(|v| v as f64);
        let (f_scores, _) = f_regression(x, &y, true)?;

        let mut indices: Vec<usize> = (0..f_scores.len()).collect();
        indices.sort_by(|&i, &j| {
            f_scores[j]
                .partial_cmp(&f_scores[i])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(indices
            .into_iter()
            .take(self.k)
            .map(|i| (i, f_scores[i]))
            .collect())
    }
}
