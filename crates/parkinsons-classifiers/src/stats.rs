//! Small numeric helpers shared by outlier detection, scaling and metrics.
//!
//! All functions work on plain `f64` slices. `NaN` handling is explicit:
//! the `nan_*` variants skip missing values, the others expect clean input.
use std::cmp::Ordering;

/// Sort a copy of the finite values of `data` in ascending order.
pub fn sorted_finite(data: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Quantile of already-sorted data using linear interpolation between the
/// closest ranks (`h = (n - 1) * q`).
///
/// Returns `NaN` for empty input.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Quantile of `data`, ignoring `NaN`.
pub fn quantile(data: &[f64], q: f64) -> f64 {
    quantile_sorted(&sorted_finite(data), q)
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Variance with `ddof` delta degrees of freedom (0 = population, 1 = sample).
pub fn variance(data: &[f64], ddof: usize) -> f64 {
    if data.len() <= ddof {
        return f64::NAN;
    }
    let m = mean(data);
    data.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (data.len() - ddof) as f64
}

pub fn std_dev(data: &[f64], ddof: usize) -> f64 {
    variance(data, ddof).sqrt()
}

pub fn nan_mean(data: &[f64]) -> f64 {
    let clean: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    mean(&clean)
}

pub fn nan_median(data: &[f64]) -> f64 {
    quantile(data, 0.5)
}

/// Ranks (1-based) of `data`, with tied values receiving the average rank.
pub fn average_ranks(data: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..data.len()).collect();
    order.sort_by(|&a, &b| data[a].partial_cmp(&data[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; data.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && data[order[j + 1]] == data[order[i]] {
            j += 1;
        }
        // positions i..=j share the mean of ranks (i+1)..=(j+1)
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}
