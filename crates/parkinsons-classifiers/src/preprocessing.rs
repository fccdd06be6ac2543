//! Scaling, train/test splitting and dataset preparation.
//!
//! The `Scaler` is always fit on the training split and then applied
//! unchanged to the test split and to inference data, so no statistic of the
//! held-out rows leaks into training.
use std::collections::BTreeMap;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, ScalingMethod};
use crate::data_handling::Dataset;
use crate::error::{PipelineError, Result};
use crate::stats::{mean, quantile, std_dev};

/// Per-column affine scaler: `(x - center) / scale`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub method: ScalingMethod,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    /// Scales below this are treated as zero and replaced by 1.
    const MIN_SCALE: f64 = 1e-12;

    pub fn n_features(&self) -> usize {
        self.center.len()
    }
}

/// Fit a `Scaler` from an `Array2<f64>` where rows are samples and columns
/// are features.
pub fn fit_scaler(x: &Array2<f64>, method: ScalingMethod) -> Result<Scaler> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(PipelineError::InsufficientData(
            "cannot fit a scaler on an empty matrix".to_string(),
        ));
    }

    let mut center = Vec::with_capacity(x.ncols());
    let mut scale = Vec::with_capacity(x.ncols());
    for col in x.axis_iter(Axis(1)) {
        let values = col.to_vec();
        let (c, s) = match method {
            ScalingMethod::Standard => (mean(&values), std_dev(&values, 0)),
            ScalingMethod::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
            ScalingMethod::Robust => (
                quantile(&values, 0.5),
                quantile(&values, 0.75) - quantile(&values, 0.25),
            ),
            ScalingMethod::None => (0.0, 1.0),
        };
        center.push(c);
        scale.push(if s.is_finite() && s > Scaler::MIN_SCALE { s } else { 1.0 });
    }

    Ok(Scaler {
        method,
        center,
        scale,
    })
}

/// Transform all rows using the provided `Scaler` and return a new matrix.
pub fn transform_all(x: &Array2<f64>, sc: &Scaler) -> Result<Array2<f64>> {
    if x.ncols() != sc.n_features() {
        return Err(PipelineError::DataFormat(format!(
            "scaler was fit on {} columns but input has {}",
            sc.n_features(),
            x.ncols()
        )));
    }
    let mut out = x.clone();
    for (c, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
        let (center, scale) = (sc.center[c], sc.scale[c]);
        col.mapv_inplace(|v| (v - center) / scale);
    }
    Ok(out)
}

/// Fit a scaler and return it along with the transformed matrix.
pub fn fit_transform(x: &Array2<f64>, method: ScalingMethod) -> Result<(Scaler, Array2<f64>)> {
    let sc = fit_scaler(x, method)?;
    let transformed = transform_all(x, &sc)?;
    Ok((sc, transformed))
}

fn test_count(n: usize, test_size: f64) -> Result<usize> {
    if n < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "need at least 2 rows to split, got {}",
            n
        )));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    Ok(n_test.clamp(1, n - 1))
}

/// Stratified train/test split over `labels`.
///
/// The test split holds `ceil(test_size * n)` rows (at least one, at most
/// `n - 1`), allocated to classes in proportion to their size with the
/// leftover rows going to the largest fractional shares. Returns sorted
/// `(train_indices, test_indices)`.
pub fn stratified_train_test_split(
    labels: &[usize],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = labels.len();
    let n_test = test_count(n, test_size)?;

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    // floor of each class's exact share, then hand out the remainder
    let mut alloc: Vec<(usize, usize, f64)> = by_class
        .iter()
        .map(|(&class, rows)| {
            let exact = n_test as f64 * rows.len() as f64 / n as f64;
            (class, exact.floor() as usize, exact - exact.floor())
        })
        .collect();
    let assigned: usize = alloc.iter().map(|a| a.1).sum();
    let mut order: Vec<usize> = (0..alloc.len()).collect();
    order.sort_by(|&a, &b| {
        alloc[b]
            .2
            .partial_cmp(&alloc[a].2)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for &i in order.iter().take(n_test.saturating_sub(assigned)) {
        alloc[i].1 += 1;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (class, n_class_test, _) in alloc {
        let mut rows = by_class.remove(&class).unwrap_or_default();
        rows.shuffle(&mut rng);
        let k = n_class_test.min(rows.len());
        test.extend_from_slice(&rows[..k]);
        train.extend_from_slice(&rows[k..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    log::debug!("Stratified split: {} train / {} test rows", train.len(), test.len());
    Ok((train, test))
}

/// Plain shuffled train/test split of `n` rows.
pub fn shuffle_train_test_split(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = test_count(n, test_size)?;
    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(&mut StdRng::seed_from_u64(seed));
    let mut test = rows[..n_test].to_vec();
    let mut train = rows[n_test..].to_vec();
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Cleaned, split and scaled data ready for feature selection and training.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Scaled training rows.
    pub train: Dataset,
    /// Scaled held-out rows.
    pub test: Dataset,
    /// Indices into the cleaned dataset.
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub scaler: Scaler,
    /// Unscaled training means, used to fill missing cells at inference.
    pub fill_values: Vec<f64>,
}

/// Applies missing-value handling, the train/test split and scaling.
pub struct Preprocessor<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Preprocessor<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Preprocessor { config }
    }

    pub fn prepare(&self, dataset: &Dataset) -> Result<PreparedData> {
        dataset.labels()?;
        let cleaned = dataset.handle_missing(self.config.missing_values);

        let min_rows = self.config.min_rows.max(2);
        if cleaned.n_rows() < min_rows {
            return Err(PipelineError::InsufficientData(format!(
                "{} rows remain after cleaning, need at least {}",
                cleaned.n_rows(),
                min_rows
            )));
        }
        let labels = cleaned.labels()?.to_vec();
        check_two_classes(&labels, "dataset")?;

        let (train_indices, test_indices) = if self.config.stratify {
            stratified_train_test_split(&labels, self.config.test_size, self.config.seed)?
        } else {
            shuffle_train_test_split(labels.len(), self.config.test_size, self.config.seed)?
        };

        let raw_train = cleaned.select_rows(&train_indices);
        let raw_test = cleaned.select_rows(&test_indices);
        check_two_classes(&raw_train.labels()?.to_vec(), "training split")?;

        let fill_values: Vec<f64> = raw_train
            .x
            .axis_iter(Axis(1))
            .map(|col| mean(&col.to_vec()))
            .collect();

        let (scaler, x_train) = fit_transform(&raw_train.x, self.config.scaling)?;
        let x_test = transform_all(&raw_test.x, &scaler)?;

        log::info!(
            "Prepared {} training and {} test rows ({:?} scaling)",
            train_indices.len(),
            test_indices.len(),
            self.config.scaling
        );

        Ok(PreparedData {
            train: Dataset { x: x_train, ..raw_train },
            test: Dataset { x: x_test, ..raw_test },
            train_indices,
            test_indices,
            scaler,
            fill_values,
        })
    }
}

pub(crate) fn check_two_classes(labels: &[usize], what: &str) -> Result<()> {
    let has_neg = labels.iter().any(|&l| l == 0);
    let has_pos = labels.iter().any(|&l| l == 1);
    if !(has_neg && has_pos) {
        return Err(PipelineError::InsufficientData(format!(
            "{} must contain both classes",
            what
        )));
    }
    Ok(())
}
