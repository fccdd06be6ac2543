//! L2-regularized logistic regression fit by damped Newton iterations.
//!
//! Minimizes `C * sum(log_loss) + 0.5 * ||w||^2`; the intercept is not
//! penalized.
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::{check_fit_input, check_predict_input, ClassifierModel};

#[derive(Debug, Clone)]
pub struct LogisticRegressionClassifier {
    params: ModelConfig,
    weights: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Numerically stable binary cross-entropy of logit `z` for a label in {0, 1}.
fn log_loss(z: f64, y: f64) -> f64 {
    z.max(0.0) - y * z + (-z.abs()).exp().ln_1p()
}

impl LogisticRegressionClassifier {
    pub fn new(params: ModelConfig) -> Self {
        LogisticRegressionClassifier {
            params,
            weights: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    fn hyper_params(&self) -> Result<(f64, usize, f64)> {
        match self.params.model_type {
            ModelType::LogisticRegression { c, max_iter, tol } => {
                if c <= 0.0 {
                    return Err(PipelineError::InvalidConfig(format!("C must be positive, got {}", c)));
                }
                Ok((c, max_iter.max(1), tol))
            }
            _ => Err(PipelineError::InvalidConfig(format!(
                "Expected ModelType::LogisticRegression but got {}",
                self.params.name()
            ))),
        }
    }

    pub fn coefficients(&self) -> Option<(&Array1<f64>, f64)> {
        self.weights.as_ref().map(|w| (w, self.intercept))
    }

    /// Number of Newton iterations the last fit took.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn objective(x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>, b: f64, c: f64) -> f64 {
        let z = x.dot(w) + b;
        let loss: f64 = z.iter().zip(y.iter()).map(|(&z, &y)| log_loss(z, y)).sum();
        c * loss + 0.5 * w.dot(w)
    }
}

impl ClassifierModel for LogisticRegressionClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;
        let (c, max_iter, tol) = self.hyper_params()?;
        let y = y.mapv(|v| v as f64);
        let (n, p) = x.dim();

        let mut w = Array1::<f64>::zeros(p);
        let mut b = 0.0;
        let mut objective = Self::objective(x, &y, &w, b, c);
        let mut converged = false;

        for iter in 0..max_iter {
            self.n_iter = iter + 1;
            let z = x.dot(&w) + b;
            let prob = z.mapv(sigmoid);
            let residual = &prob - &y;
            let s = prob.mapv(|q| (q * (1.0 - q)).max(1e-12));

            // gradient, intercept last
            let mut grad = Array1::<f64>::zeros(p + 1);
            let gw = x.t().dot(&residual) * c + &w;
            grad.slice_mut(ndarray::s![..p]).assign(&gw);
            grad[p] = c * residual.sum();

            // Hessian of the penalized objective
            let mut hess = Array2::<f64>::zeros((p + 1, p + 1));
            let xs = x * &s.view().insert_axis(ndarray::Axis(1));
            let hww = x.t().dot(&xs) * c;
            hess.slice_mut(ndarray::s![..p, ..p]).assign(&hww);
            for j in 0..p {
                hess[(j, j)] += 1.0;
            }
            let hwb = xs.sum_axis(ndarray::Axis(0)) * c;
            hess.slice_mut(ndarray::s![..p, p]).assign(&hwb);
            hess.slice_mut(ndarray::s![p, ..p]).assign(&hwb);
            hess[(p, p)] = c * s.sum() + 1e-10;

            let step = solve_linear_system(hess, grad).ok_or_else(|| {
                PipelineError::fit(self.name(), "singular Hessian during Newton update")
            })?;

            // backtracking keeps each update a descent step
            let step_w = step.slice(ndarray::s![..p]);
            let mut t = 1.0;
            let mut w_new = &w - &step_w;
            let mut b_new = b - step[p];
            let mut obj_new = Self::objective(x, &y, &w_new, b_new, c);
            while obj_new > objective && t >= 1e-10 {
                t *= 0.5;
                w_new = &w - &(&step_w * t);
                b_new = b - t * step[p];
                obj_new = Self::objective(x, &y, &w_new, b_new, c);
            }

            let max_step = step.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())) * t;
            w = w_new;
            b = b_new;
            objective = obj_new;
            if max_step < tol {
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!(
                "{} did not converge in {} iterations on {} samples",
                self.name(),
                max_iter,
                n
            );
        }
        if w.iter().any(|v| !v.is_finite()) || !b.is_finite() {
            return Err(PipelineError::fit(self.name(), "coefficients diverged"));
        }

        log::trace!("{} converged after {} iterations", self.name(), self.n_iter);
        self.weights = Some(w);
        self.intercept = b;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(PipelineError::ModelNotTrained)?;
        check_predict_input(w.len(), x)?;
        Ok((x.dot(w) + self.intercept).mapv(sigmoid))
    }

    fn name(&self) -> &str {
        "logistic_regression"
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
/// Returns `None` when `a` is numerically singular.
pub(crate) fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[(i, col)]
                .abs()
                .partial_cmp(&a[(j, col)].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[(pivot, col)].abs() < 1e-14 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap((pivot, k), (col, k));
            }
            b.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = a[(row, col)] / a[(col, col)];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[(row, k)] -= factor * a[(col, k)];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[(row, k)] * x[k]).sum();
        x[row] = (b[row] - tail) / a[(row, row)];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn config(c: f64) -> ModelConfig {
        ModelConfig::new(
            0,
            ModelType::LogisticRegression {
                c,
                max_iter: 100,
                tol: 1e-8,
            },
        )
    }

    #[test]
    fn solves_small_system() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = solve_linear_system(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn separates_linear_classes() {
        let x = array![[-2.0], [-1.5], [-1.0], [-0.5], [0.5], [1.0], [1.5], [2.0]];
        let y = array![0, 0, 0, 0, 1, 1, 1, 1];
        let mut model = LogisticRegressionClassifier::new(config(1.0));
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert_eq!(pred, y);
        let (w, _) = model.coefficients().unwrap();
        assert!(w[0] > 0.0);
    }

    #[test]
    fn stronger_regularization_shrinks_weights() {
        let x = array![[-2.0], [-1.0], [-0.2], [0.3], [1.0], [2.0]];
        let y = array![0, 0, 1, 0, 1, 1];
        let mut weak = LogisticRegressionClassifier::new(config(100.0));
        let mut strong = LogisticRegressionClassifier::new(config(0.01));
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();
        let w_weak = weak.coefficients().unwrap().0[0];
        let w_strong = strong.coefficients().unwrap().0[0];
        assert!(w_strong.abs() < w_weak.abs());
    }

    #[test]
    fn predict_before_fit_fails() {
        let model = LogisticRegressionClassifier::new(config(1.0));
        assert!(matches!(
            model.predict_proba(&array![[1.0]]),
            Err(PipelineError::ModelNotTrained)
        ));
    }
}
