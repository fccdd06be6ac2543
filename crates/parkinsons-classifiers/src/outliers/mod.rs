//! IQR, Z-score and isolation forest outlier detection.
//!
//! Detection is read-only: every function takes a `Dataset` by reference and
//! returns flags or a report. `remove_outliers` builds a new dataset from a
//! report when the caller decides to act on it.
pub mod isolation_forest;

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use serde::Serialize;

use crate::config::{OutlierConfig, OutlierMethod};
use crate::data_handling::Dataset;
use crate::error::{PipelineError, Result};
use crate::stats::{mean, quantile_sorted, sorted_finite, std_dev};
use isolation_forest::IsolationForest;

/// Rows each isolation tree is grown on.
const ISOLATION_MAX_SAMPLES: usize = 256;

/// Method-specific statistics for one column.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierStats {
    Iqr {
        q1: f64,
        q3: f64,
        iqr: f64,
        lower_bound: f64,
        upper_bound: f64,
        multiplier: f64,
    },
    Zscore {
        mean: f64,
        std: f64,
        threshold: f64,
        max_abs_z: f64,
    },
    IsolationForest {
        contamination: f64,
        /// Anomaly score above which a value is flagged.
        score_threshold: f64,
        n_trees: usize,
    },
}

/// Outliers flagged in a single column by a single method.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnOutliers {
    pub column: String,
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    /// Row indices (into the analysed dataset) of the flagged values.
    pub outlier_indices: Vec<usize>,
    pub stats: OutlierStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MethodSummary {
    pub total_outliers: usize,
    pub columns_with_outliers: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutlierReport {
    pub n_rows: usize,
    pub n_columns: usize,
    pub methods: Vec<OutlierMethod>,
    pub detailed_results: BTreeMap<OutlierMethod, Vec<ColumnOutliers>>,
    pub summary: BTreeMap<OutlierMethod, MethodSummary>,
    pub recommendations: Vec<String>,
}

impl OutlierReport {
    /// Union of rows flagged by `method` in `columns` (all columns when `None`).
    pub fn flagged_rows(
        &self,
        method: OutlierMethod,
        columns: Option<&[String]>,
    ) -> Result<BTreeSet<usize>> {
        let results = self.detailed_results.get(&method).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("method '{}' is not part of this report", method))
        })?;
        Ok(results
            .iter()
            .filter(|r| columns.map_or(true, |cols| cols.contains(&r.column)))
            .flat_map(|r| r.outlier_indices.iter().copied())
            .collect())
    }

    pub fn column(&self, method: OutlierMethod, column: &str) -> Option<&ColumnOutliers> {
        self.detailed_results
            .get(&method)?
            .iter()
            .find(|r| r.column == column)
    }
}

fn column_values(dataset: &Dataset, column: &str) -> Result<Vec<f64>> {
    let idx = dataset.column_index(column).ok_or_else(|| {
        PipelineError::DataFormat(format!("Unknown column '{}'", column))
    })?;
    Ok(dataset.x.column(idx).to_vec())
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Flag values outside `[Q1 - m*IQR, Q3 + m*IQR]`.
///
/// Quantiles are linearly interpolated and computed over non-missing values;
/// missing values are never flagged.
pub fn apply_iqr(dataset: &Dataset, column: &str, multiplier: f64) -> Result<ColumnOutliers> {
    let values = column_values(dataset, column)?;
    let sorted = sorted_finite(&values);
    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_bound = q1 - multiplier * iqr;
    let upper_bound = q3 + multiplier * iqr;

    let outlier_indices: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v < lower_bound || v > upper_bound)
        .map(|(i, _)| i)
        .collect();

    Ok(ColumnOutliers {
        column: column.to_string(),
        outlier_count: outlier_indices.len(),
        outlier_percentage: percentage(outlier_indices.len(), values.len()),
        outlier_indices,
        stats: OutlierStats::Iqr {
            q1,
            q3,
            iqr,
            lower_bound,
            upper_bound,
            multiplier,
        },
    })
}

/// Flag values with `|z| > threshold`, using the column mean and sample
/// standard deviation. A constant column has `z = 0` everywhere.
pub fn detect_outliers_zscore(
    dataset: &Dataset,
    column: &str,
    threshold: f64,
) -> Result<ColumnOutliers> {
    let values = column_values(dataset, column)?;
    let clean: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let m = mean(&clean);
    let s = std_dev(&clean, 1);

    let z: Vec<f64> = values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else if s.is_nan() || s <= f64::EPSILON {
                0.0
            } else {
                (v - m) / s
            }
        })
        .collect();

    let outlier_indices: Vec<usize> = z
        .iter()
        .enumerate()
        .filter(|(_, z)| z.abs() > threshold)
        .map(|(i, _)| i)
        .collect();
    let max_abs_z = z
        .iter()
        .filter(|v| !v.is_nan())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));

    Ok(ColumnOutliers {
        column: column.to_string(),
        outlier_count: outlier_indices.len(),
        outlier_percentage: percentage(outlier_indices.len(), values.len()),
        outlier_indices,
        stats: OutlierStats::Zscore {
            mean: m,
            std: if s.is_nan() { 0.0 } else { s },
            threshold,
            max_abs_z,
        },
    })
}

/// Flag the `contamination` share of values an isolation forest finds
/// easiest to isolate. Scores above the `1 - contamination` quantile of the
/// column's scores are outliers; missing and infinite values are never
/// flagged.
pub fn detect_outliers_isolation_forest(
    dataset: &Dataset,
    column: &str,
    contamination: f64,
    n_trees: usize,
    seed: u64,
) -> Result<ColumnOutliers> {
    if !(contamination > 0.0 && contamination <= 0.5) {
        return Err(PipelineError::InvalidConfig(format!(
            "contamination must be in (0, 0.5], got {}",
            contamination
        )));
    }
    let values = column_values(dataset, column)?;
    let present: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_finite()).collect();

    let (outlier_indices, score_threshold) = if present.is_empty() {
        (Vec::new(), f64::NAN)
    } else {
        let x = Array2::from_shape_fn((present.len(), 1), |(r, _)| values[present[r]]);
        let mut forest = IsolationForest::new(n_trees, ISOLATION_MAX_SAMPLES, seed);
        forest.fit(&x)?;
        let scores = forest.score_samples(&x)?;
        let threshold = quantile_sorted(&sorted_finite(&scores.to_vec()), 1.0 - contamination);
        let flagged = present
            .iter()
            .zip(scores.iter())
            .filter(|(_, &s)| s > threshold)
            .map(|(&i, _)| i)
            .collect();
        (flagged, threshold)
    };

    Ok(ColumnOutliers {
        column: column.to_string(),
        outlier_count: outlier_indices.len(),
        outlier_percentage: percentage(outlier_indices.len(), values.len()),
        outlier_indices,
        stats: OutlierStats::IsolationForest {
            contamination,
            score_threshold,
            n_trees,
        },
    })
}

/// Run every configured method over every feature column and summarise.
pub fn detect_and_report_outliers(dataset: &Dataset, config: &OutlierConfig) -> Result<OutlierReport> {
    log::info!(
        "Outlier detection on {} rows x {} columns using {:?}",
        dataset.n_rows(),
        dataset.n_features(),
        config.methods
    );

    let mut detailed_results = BTreeMap::new();
    let mut summary = BTreeMap::new();

    for &method in &config.methods {
        let mut results = Vec::with_capacity(dataset.n_features());
        for column in &dataset.feature_names {
            let result = match method {
                OutlierMethod::Iqr => apply_iqr(dataset, column, config.iqr_multiplier)?,
                OutlierMethod::Zscore => {
                    detect_outliers_zscore(dataset, column, config.zscore_threshold)?
                }
                OutlierMethod::IsolationForest => detect_outliers_isolation_forest(
                    dataset,
                    column,
                    config.contamination,
                    config.isolation_trees,
                    config.seed,
                )?,
            };
            if result.outlier_count > 0 {
                log::debug!(
                    "[{}] {}: {} outliers ({:.2}%)",
                    method,
                    column,
                    result.outlier_count,
                    result.outlier_percentage
                );
            }
            results.push(result);
        }

        let method_summary = MethodSummary {
            total_outliers: results.iter().map(|r| r.outlier_count).sum(),
            columns_with_outliers: results.iter().filter(|r| r.outlier_count > 0).count(),
        };
        log::info!(
            "[{}] {} outliers across {} columns",
            method,
            method_summary.total_outliers,
            method_summary.columns_with_outliers
        );
        summary.insert(method, method_summary);
        detailed_results.insert(method, results);
    }

    let recommendations = recommendations(&detailed_results);

    Ok(OutlierReport {
        n_rows: dataset.n_rows(),
        n_columns: dataset.n_features(),
        methods: config.methods.clone(),
        detailed_results,
        summary,
        recommendations,
    })
}

fn recommendations(detailed: &BTreeMap<OutlierMethod, Vec<ColumnOutliers>>) -> Vec<String> {
    let mut out = Vec::new();
    for results in detailed.values() {
        for r in results {
            if r.outlier_percentage > 10.0 {
                out.push(format!(
                    "High outlier percentage in {} ({:.1}%) - consider investigation",
                    r.column, r.outlier_percentage
                ));
            } else if r.outlier_percentage > 5.0 {
                out.push(format!(
                    "Moderate outlier percentage in {} ({:.1}%) - review if expected",
                    r.column, r.outlier_percentage
                ));
            }
        }
    }
    if out.is_empty() {
        out.push("No significant outlier issues detected".to_string());
    }
    out.push("Consider domain knowledge when deciding to remove outliers".to_string());
    out.push("For medical data, consult with domain experts before outlier removal".to_string());
    out
}

/// Build a new dataset without the rows `method` flagged in `columns`
/// (all analysed columns when `None`).
pub fn remove_outliers(
    dataset: &Dataset,
    report: &OutlierReport,
    method: OutlierMethod,
    columns: Option<&[String]>,
) -> Result<Dataset> {
    if report.n_rows != dataset.n_rows() {
        return Err(PipelineError::InvalidConfig(format!(
            "report covers {} rows but dataset has {}",
            report.n_rows,
            dataset.n_rows()
        )));
    }
    let flagged = report.flagged_rows(method, columns)?;
    let keep: Vec<usize> = (0..dataset.n_rows()).filter(|r| !flagged.contains(r)).collect();
    log::info!(
        "Removed {} rows flagged by {} ({} remain)",
        flagged.len(),
        method,
        keep.len()
    );
    Ok(dataset.select_rows(&keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn single_column(values: &[f64]) -> Dataset {
        Dataset::new(
            (0..values.len()).map(|i| format!("r{}", i)).collect(),
            vec!["f".to_string()],
            Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn iqr_flags_extreme_value() {
        let ds = single_column(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        let r = apply_iqr(&ds, "f", 1.5).unwrap();
        assert_eq!(r.outlier_indices, vec![5]);
        match r.stats {
            OutlierStats::Iqr { q1, q3, .. } => {
                assert!((q1 - 2.25).abs() < 1e-12);
                assert!((q3 - 4.75).abs() < 1e-12);
            }
            _ => panic!("expected IQR stats"),
        }
    }

    #[test]
    fn constant_column_has_no_zscore_outliers() {
        let ds = single_column(&[7.0; 20]);
        let r = detect_outliers_zscore(&ds, "f", 3.0).unwrap();
        assert_eq!(r.outlier_count, 0);
    }

    #[test]
    fn unknown_column_is_an_error() {
        let ds = single_column(&[1.0, 2.0]);
        assert!(apply_iqr(&ds, "missing", 1.5).is_err());
    }
}
