//! Held-out evaluation metrics.
//!
//! Precision, recall and F1 treat class 1 (Parkinson's) as positive and
//! report 0 when their denominator is zero.
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::ClassifierModel;
use crate::stats::average_ranks;
use crate::training::{CvScores, TrainedModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Self {
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (1, 1) => cm.tp += 1,
                (1, _) => cm.fn_ += 1,
                (_, 1) => cm.fp += 1,
                _ => cm.tn += 1,
            }
        }
        cm
    }

    /// Rows are true classes (0, 1), columns predicted classes.
    pub fn as_rows(&self) -> Vec<Vec<usize>> {
        vec![vec![self.tn, self.fp], vec![self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> f64 {
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    ratio(correct, y_true.len())
}

pub fn precision(cm: &ConfusionMatrix) -> f64 {
    ratio(cm.tp, cm.tp + cm.fp)
}

pub fn recall(cm: &ConfusionMatrix) -> f64 {
    ratio(cm.tp, cm.tp + cm.fn_)
}

pub fn f1_score(cm: &ConfusionMatrix) -> f64 {
    let (p, r) = (precision(cm), recall(cm));
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Area under the ROC curve via the Mann-Whitney rank statistic, with tied
/// scores sharing their average rank. `None` when `y_true` holds one class.
pub fn roc_auc(y_true: &Array1<usize>, scores: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }
    let ranks = average_ranks(&scores.to_vec());
    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(y_true.iter())
        .filter(|(_, &t)| t == 1)
        .map(|(r, _)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

/// ROC curve points `(fpr, tpr, thresholds)`, starting at (0, 0).
pub fn roc_curve(y_true: &Array1<usize>, scores: &Array1<f64>) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n_pos = y_true.iter().filter(|&&t| t == 1).count() as f64;
    let n_neg = y_true.len() as f64 - n_pos;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0.0, 0.0);
    for (k, &i) in order.iter().enumerate() {
        if y_true[i] == 1 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = k + 1 == order.len() || scores[order[k + 1]] != scores[i];
        if last_of_tie {
            fpr.push(if n_neg > 0.0 { fp / n_neg } else { 0.0 });
            tpr.push(if n_pos > 0.0 { tp / n_pos } else { 0.0 });
            thresholds.push(scores[i]);
        }
    }
    (fpr, tpr, thresholds)
}

/// Held-out performance of one trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub model: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when the test labels contain a single class.
    pub roc_auc: Option<f64>,
    pub confusion_matrix: ConfusionMatrix,
    pub cv_mean: f64,
    pub cv_std: f64,
    /// Class-1 probabilities on the test split, kept for ROC plots.
    pub probabilities: Vec<f64>,
}

pub fn evaluate_model(
    name: &str,
    model: &dyn ClassifierModel,
    x_test: &Array2<f64>,
    y_test: &Array1<usize>,
    cv: &CvScores,
) -> Result<EvaluationResult> {
    if x_test.nrows() != y_test.len() {
        return Err(PipelineError::DataFormat(format!(
            "{} test rows but {} labels",
            x_test.nrows(),
            y_test.len()
        )));
    }
    let probabilities = model.predict_proba(x_test)?;
    let predicted = probabilities.mapv(|p| usize::from(p >= 0.5));
    let cm = ConfusionMatrix::from_labels(y_test, &predicted);

    let result = EvaluationResult {
        model: name.to_string(),
        accuracy: accuracy(y_test, &predicted),
        precision: precision(&cm),
        recall: recall(&cm),
        f1: f1_score(&cm),
        roc_auc: roc_auc(y_test, &probabilities),
        confusion_matrix: cm,
        cv_mean: cv.mean,
        cv_std: cv.std,
        probabilities: probabilities.to_vec(),
    };
    log::info!(
        "{}: accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4}, ROC-AUC {}",
        name,
        result.accuracy,
        result.precision,
        result.recall,
        result.f1,
        result
            .roc_auc
            .map_or("n/a".to_string(), |auc| format!("{:.4}", auc))
    );
    Ok(result)
}

/// Evaluate every trained model on the same held-out split. Each entry keeps
/// its own outcome.
pub fn evaluate_models(
    models: &[TrainedModel],
    x_test: &Array2<f64>,
    y_test: &Array1<usize>,
) -> Vec<(String, Result<EvaluationResult>)> {
    models
        .iter()
        .map(|m| {
            let name = m.name().to_string();
            let result = evaluate_model(&name, m.model.as_ref(), x_test, y_test, &m.cv);
            (name, result)
        })
        .collect()
}

/// The result with the highest F1 (first wins ties).
pub fn best_model_by_f1(results: &[EvaluationResult]) -> Option<&EvaluationResult> {
    results
        .iter()
        .fold(None, |best: Option<&EvaluationResult>, r| match best {
            Some(b) if b.f1 >= r.f1 => Some(b),
            _ => Some(r),
        })
}
