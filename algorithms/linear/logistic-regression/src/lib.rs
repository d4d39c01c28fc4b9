use churn_helpers::Float;
use ndarray::{Array1, ArrayView1, ArrayView2};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use tracing::debug;

/// Errors that can occur while fitting a logistic regression.
#[derive(Debug, Clone, PartialEq)]
pub enum LogisticError {
    /// The training data is empty.
    EmptyDataSet,
    /// Feature rows and labels disagree in length.
    MismatchedDimensions { rows: usize, labels: usize },
    /// A label other than 0 or 1 was supplied.
    NonBinaryLabel(usize),
    /// A hyperparameter is out of range.
    InvalidParameter(String),
    /// The loss became NaN or infinite.
    Diverged,
}

impl Display for LogisticError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogisticError::EmptyDataSet => write!(f, "Training data is empty"),
            LogisticError::MismatchedDimensions { rows, labels } => {
                write!(f, "{} feature rows but {} labels", rows, labels)
            }
            LogisticError::NonBinaryLabel(l) => {
                write!(f, "Label {} is not binary (expected 0 or 1)", l)
            }
            LogisticError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            LogisticError::Diverged => write!(f, "Optimisation diverged"),
        }
    }
}

impl Error for LogisticError {}

/// L2-regularised binary logistic regression.
///
/// Minimises the mean log-loss plus `||w||^2 / (2 * c * n)` with full-batch
/// gradient descent and a backtracking step size. The intercept is not
/// penalised.
#[derive(Debug, Clone)]
pub struct LogisticRegression<F: Float> {
    c: F,
    learning_rate: F,
    max_iter: usize,
    tolerance: F,
}

impl<F: Float> Default for LogisticRegression<F> {
    fn default() -> Self {
        Self {
            c: F::one(),
            learning_rate: F::one(),
            max_iter: 500,
            tolerance: F::from_f64_lossy(1e-4),
        }
    }
}

/// A fitted model: coefficients and intercept.
#[derive(Debug, Clone)]
pub struct FittedLogisticRegression<F: Float> {
    pub weights: Array1<F>,
    pub intercept: F,
    pub n_iter: usize,
}

impl<F: Float> LogisticRegression<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inverse regularisation strength; smaller is stronger.
    pub fn c(mut self, c: F) -> Self {
        self.c = c;
        self
    }

    /// Initial step size of every descent iteration.
    pub fn learning_rate(mut self, learning_rate: F) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Stop once the largest gradient component falls below this.
    pub fn tolerance(mut self, tolerance: F) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<(), LogisticError> {
        if !(self.c > F::zero()) {
            return Err(LogisticError::InvalidParameter("c must be positive".into()));
        }
        if !(self.learning_rate > F::zero()) {
            return Err(LogisticError::InvalidParameter(
                "learning_rate must be positive".into(),
            ));
        }
        if self.max_iter == 0 {
            return Err(LogisticError::InvalidParameter(
                "max_iter must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fits the model on `x` (rows are samples) and 0/1 labels `y`.
    pub fn fit(
        &self,
        x: ArrayView2<F>,
        y: ArrayView1<usize>,
    ) -> Result<FittedLogisticRegression<F>, LogisticError> {
        self.validate()?;
        if x.nrows() == 0 {
            return Err(LogisticError::EmptyDataSet);
        }
        if x.nrows() != y.len() {
            return Err(LogisticError::MismatchedDimensions {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&l| l > 1) {
            return Err(LogisticError::NonBinaryLabel(bad));
        }

        let n = F::from_count(x.nrows());
        let targets: Array1<F> = y.mapv(|l| if l == 1 { F::one() } else { F::zero() });
        let penalty = F::one() / (self.c * n);

        let mut weights = Array1::<F>::zeros(x.ncols());
        let mut intercept = F::zero();
        let mut loss = objective(x, &targets, &weights, intercept, penalty);
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let residual = predict_proba_raw(x, &weights, intercept) - &targets;
            let grad_w = x.t().dot(&residual) / n + &(&weights * penalty);
            let grad_b = residual.sum() / n;

            let grad_norm_sq = grad_w.dot(&grad_w) + grad_b * grad_b;
            let max_grad = grad_w
                .iter()
                .fold(grad_b.max(-grad_b), |acc, &g| acc.max(g).max(-g));
            if max_grad < self.tolerance {
                break;
            }

            // Armijo backtracking from the configured step.
            let mut step = self.learning_rate;
            let half = F::from_f64_lossy(0.5);
            let min_step = F::from_f64_lossy(1e-12);
            loop {
                let w_new = &weights - &(&grad_w * step);
                let b_new = intercept - grad_b * step;
                let loss_new = objective(x, &targets, &w_new, b_new, penalty);
                if loss_new <= loss - half * step * grad_norm_sq || step < min_step {
                    weights = w_new;
                    intercept = b_new;
                    loss = loss_new;
                    break;
                }
                step = step * half;
            }

            if !loss.is_finite() {
                return Err(LogisticError::Diverged);
            }
        }

        debug!(iterations = n_iter, loss = ?loss, "logistic regression fitted");

        Ok(FittedLogisticRegression {
            weights,
            intercept,
            n_iter,
        })
    }
}

impl<F: Float> FittedLogisticRegression<F> {
    /// Probability of class 1 for every row.
    pub fn predict_proba(&self, x: ArrayView2<F>) -> Array1<F> {
        predict_proba_raw(x, &self.weights, self.intercept)
    }

    /// Class labels, thresholding the probability at 0.5.
    pub fn predict(&self, x: ArrayView2<F>) -> Array1<usize> {
        let half = F::from_f64_lossy(0.5);
        self.predict_proba(x)
            .mapv(|p| if p > half { 1 } else { 0 })
    }
}

fn sigmoid<F: Float>(z: F) -> F {
    if z >= F::zero() {
        F::one() / (F::one() + (-z).exp())
    } else {
        let e = z.exp();
        e / (F::one() + e)
    }
}

fn predict_proba_raw<F: Float>(x: ArrayView2<F>, weights: &Array1<F>, intercept: F) -> Array1<F> {
    (x.dot(weights) + intercept).mapv(sigmoid::<F>)
}

fn objective<F: Float>(
    x: ArrayView2<F>,
    targets: &Array1<F>,
    weights: &Array1<F>,
    intercept: F,
    penalty: F,
) -> F {
    let eps = F::from_f64_lossy(1e-15);
    let probs = predict_proba_raw(x, weights, intercept);
    let log_loss: F = probs
        .iter()
        .zip(targets.iter())
        .map(|(&p, &t)| {
            let p = p.max(eps).min(F::one() - eps);
            -(t * p.ln() + (F::one() - t) * (F::one() - p).ln())
        })
        .sum();
    let n = F::from_count(targets.len());
    log_loss / n + penalty * weights.dot(weights) / F::from_f64_lossy(2.0)
}
