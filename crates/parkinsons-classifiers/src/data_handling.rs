//! Data structures and helpers for voice-measurement datasets.
//!
//! A `Dataset` holds the recording names, the feature matrix and, when the
//! input carried a `status` column, the binary diagnosis labels. Every
//! transformation returns a new `Dataset`; nothing is modified in place.
use std::collections::{BTreeMap, HashSet};

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use crate::config::MissingValueStrategy;
use crate::error::{PipelineError, Result};
use crate::stats::{nan_mean, nan_median};

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Recording identifiers, one per row.
    pub names: Vec<String>,
    /// Feature column names, in matrix column order.
    pub feature_names: Vec<String>,
    /// Feature matrix (rows x features). Missing cells are `NaN`.
    pub x: Array2<f64>,
    /// Diagnosis labels (1 = Parkinson's, 0 = healthy). `None` in inference mode.
    pub y: Option<Array1<usize>>,
}

/// Column-level description used by the analysis endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_columns: usize,
    pub columns: Vec<String>,
    pub missing_values: BTreeMap<String, usize>,
    pub class_counts: Option<BTreeMap<usize, usize>>,
    /// Rows repeating the feature values and label of an earlier row.
    pub duplicate_rows: usize,
    /// Columns holding infinite values, with their counts.
    pub infinite_values: BTreeMap<String, usize>,
    /// Jitter and shimmer columns holding negative values, with their counts.
    pub negative_values: BTreeMap<String, usize>,
}

impl Dataset {
    pub fn new(
        names: Vec<String>,
        feature_names: Vec<String>,
        x: Array2<f64>,
        y: Option<Array1<usize>>,
    ) -> Result<Self> {
        if names.len() != x.nrows() {
            return Err(PipelineError::DataFormat(format!(
                "{} names for {} rows",
                names.len(),
                x.nrows()
            )));
        }
        if feature_names.len() != x.ncols() {
            return Err(PipelineError::DataFormat(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                x.ncols()
            )));
        }
        if let Some(labels) = &y {
            if labels.len() != x.nrows() {
                return Err(PipelineError::DataFormat(format!(
                    "{} labels for {} rows",
                    labels.len(),
                    x.nrows()
                )));
            }
            if let Some(bad) = labels.iter().find(|&&l| l > 1) {
                return Err(PipelineError::DataFormat(format!(
                    "status must be 0 or 1, found {}",
                    bad
                )));
            }
        }
        Ok(Dataset {
            names,
            feature_names,
            x,
            y,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn has_labels(&self) -> bool {
        self.y.is_some()
    }

    /// Labels, or a `DataFormat` error when the dataset has no `status` column.
    pub fn labels(&self) -> Result<&Array1<usize>> {
        self.y.as_ref().ok_or_else(|| {
            PipelineError::DataFormat("dataset has no 'status' column".to_string())
        })
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.feature_names.iter().position(|name| name == column)
    }

    /// Number of `NaN` cells per feature column.
    pub fn missing_counts(&self) -> Vec<usize> {
        self.x
            .axis_iter(Axis(1))
            .map(|col| col.iter().filter(|v| v.is_nan()).count())
            .collect()
    }

    pub fn total_missing(&self) -> usize {
        self.missing_counts().iter().sum()
    }

    /// Count of samples per class.
    pub fn class_counts(&self) -> Option<BTreeMap<usize, usize>> {
        self.y.as_ref().map(|labels| {
            let mut counts = BTreeMap::new();
            for &label in labels.iter() {
                *counts.entry(label).or_insert(0) += 1;
            }
            counts
        })
    }

    /// Return a new dataset holding only `rows`, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            names: rows.iter().map(|&i| self.names[i].clone()).collect(),
            feature_names: self.feature_names.clone(),
            x: self.x.select(Axis(0), rows),
            y: self.y.as_ref().map(|labels| labels.select(Axis(0), rows)),
        }
    }

    /// Return a new dataset holding only the feature columns at `columns`.
    pub fn select_columns(&self, columns: &[usize]) -> Dataset {
        Dataset {
            names: self.names.clone(),
            feature_names: columns
                .iter()
                .map(|&c| self.feature_names[c].clone())
                .collect(),
            x: self.x.select(Axis(1), columns),
            y: self.y.clone(),
        }
    }

    /// Apply a missing-value strategy. Dropping removes every row holding a
    /// `NaN`; filling replaces `NaN` with the column mean or median.
    pub fn handle_missing(&self, strategy: MissingValueStrategy) -> Dataset {
        if self.total_missing() == 0 {
            return self.clone();
        }
        match strategy {
            MissingValueStrategy::Drop => {
                let keep: Vec<usize> = (0..self.n_rows())
                    .filter(|&r| self.x.row(r).iter().all(|v| !v.is_nan()))
                    .collect();
                log::info!(
                    "Dropped {} rows with missing values ({} remain)",
                    self.n_rows() - keep.len(),
                    keep.len()
                );
                self.select_rows(&keep)
            }
            MissingValueStrategy::FillMean | MissingValueStrategy::FillMedian => {
                let fill: Vec<f64> = self
                    .x
                    .axis_iter(Axis(1))
                    .map(|col| {
                        let values: Vec<f64> = col.to_vec();
                        let v = if strategy == MissingValueStrategy::FillMean {
                            nan_mean(&values)
                        } else {
                            nan_median(&values)
                        };
                        if v.is_nan() {
                            0.0
                        } else {
                            v
                        }
                    })
                    .collect();
                log::info!(
                    "Filled {} missing values using {:?}",
                    self.total_missing(),
                    strategy
                );
                self.fill_missing(&fill)
            }
        }
    }

    /// Replace `NaN` cells with the per-column value in `fill`.
    pub fn fill_missing(&self, fill: &[f64]) -> Dataset {
        let mut x = self.x.clone();
        for (mut col, &value) in x.axis_iter_mut(Axis(1)).zip(fill.iter()) {
            col.mapv_inplace(|v| if v.is_nan() { value } else { v });
        }
        Dataset {
            names: self.names.clone(),
            feature_names: self.feature_names.clone(),
            x,
            y: self.y.clone(),
        }
    }

    pub fn summary(&self) -> DatasetSummary {
        let missing_values = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.missing_counts())
            .collect();
        let n_columns = self.n_features() + 1 + usize::from(self.has_labels());
        DatasetSummary {
            n_rows: self.n_rows(),
            n_columns,
            columns: self.feature_names.clone(),
            missing_values,
            class_counts: self.class_counts(),
            duplicate_rows: self.duplicate_rows(),
            infinite_values: self.count_per_column(|_| true, |v| v.is_infinite()),
            negative_values: self.count_per_column(is_non_negative_measure, |v| v < 0.0),
        }
    }

    /// Number of rows whose feature values (bitwise) and label match an
    /// earlier row. Recording names are not compared.
    pub fn duplicate_rows(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.n_rows());
        (0..self.n_rows())
            .filter(|&r| {
                let mut key: Vec<u64> = self.x.row(r).iter().map(|v| v.to_bits()).collect();
                if let Some(labels) = &self.y {
                    key.push(labels[r] as u64);
                }
                !seen.insert(key)
            })
            .count()
    }

    /// Per-column count of values matching `pred`, over the columns accepted
    /// by `column_filter`. Columns with a zero count are left out.
    fn count_per_column(
        &self,
        column_filter: impl Fn(&str) -> bool,
        pred: impl Fn(f64) -> bool,
    ) -> BTreeMap<String, usize> {
        self.feature_names
            .iter()
            .zip(self.x.axis_iter(Axis(1)))
            .filter(|(name, _)| column_filter(name))
            .map(|(name, col)| (name.clone(), col.iter().filter(|&&v| pred(v)).count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn log_input_data_summary(&self) {
        log::info!("----- Input Data Summary -----");
        match self.class_counts() {
            Some(counts) => log::info!(
                "{} Parkinson's recordings and {} healthy recordings",
                counts.get(&1).copied().unwrap_or(0),
                counts.get(&0).copied().unwrap_or(0)
            ),
            None => log::info!("{} unlabeled recordings", self.n_rows()),
        }
        log::info!("{} feature columns", self.n_features());
        log::info!("{} missing values", self.total_missing());
        log::info!("-------------------------------");
    }
}

/// Jitter and shimmer measures are magnitudes and cannot be negative.
fn is_non_negative_measure(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower.contains("jitter") || lower.contains("shimmer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> Dataset {
        Dataset::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec!["f1".into(), "f2".into()],
            array![[1.0, f64::NAN], [3.0, 4.0], [5.0, 8.0]],
            Some(array![0, 1, 1]),
        )
        .unwrap()
    }

    #[test]
    fn summary_reports_quality_issues() {
        let ds = Dataset::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec!["MDVP:Jitter(%)".into(), "spread1".into(), "HNR".into()],
            array![
                [0.01, -5.0, 21.0],
                [-0.02, -6.0, f64::INFINITY],
                [0.01, -5.0, 21.0],
                [0.01, -5.0, 21.0]
            ],
            Some(array![1, 1, 1, 0]),
        )
        .unwrap();
        let summary = ds.summary();
        // row d differs from a only in its label
        assert_eq!(summary.duplicate_rows, 1);
        assert_eq!(summary.infinite_values, BTreeMap::from([("HNR".to_string(), 1)]));
        // spread1 is negative by nature and is not checked
        assert_eq!(
            summary.negative_values,
            BTreeMap::from([("MDVP:Jitter(%)".to_string(), 1)])
        );
    }

    #[test]
    fn clean_data_has_empty_quality_maps() {
        let summary = toy().summary();
        assert_eq!(summary.duplicate_rows, 0);
        assert!(summary.infinite_values.is_empty());
        assert!(summary.negative_values.is_empty());
    }

    #[test]
    fn drop_removes_rows_with_nan() {
        let ds = toy().handle_missing(MissingValueStrategy::Drop);
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.names, vec!["b", "c"]);
        assert_eq!(ds.y.unwrap().to_vec(), vec![1, 1]);
    }

    #[test]
    fn fill_mean_replaces_nan() {
        let ds = toy().handle_missing(MissingValueStrategy::FillMean);
        assert_eq!(ds.n_rows(), 3);
        assert!((ds.x[(0, 1)] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_labels_outside_binary_range() {
        let err = Dataset::new(
            vec!["a".into()],
            vec!["f1".into()],
            array![[1.0]],
            Some(array![2]),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::DataFormat(_)));
    }
}
