//! Gradient-boosted trees for binary classification.
//!
//! Each round fits a [`GradientTree`] to the gradient and hessian of the
//! logistic loss at the current margin and adds its scores, shrunk by the
//! learning rate.

use churn_helpers::{Float, seeded_rng};
use decision_tree::{GradientTree, GradientTreeParams, TreeError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::seq::index;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use tracing::debug;

/// Errors that can occur while boosting.
#[derive(Debug, Clone, PartialEq)]
pub enum BoostingError {
    InvalidParameter(String),
    EmptyDataSet,
    MismatchedDimensions { rows: usize, labels: usize },
    /// A label other than 0 or 1 was supplied.
    NonBinaryLabel(usize),
    Tree(TreeError),
}

impl Display for BoostingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BoostingError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            BoostingError::EmptyDataSet => write!(f, "Training data is empty"),
            BoostingError::MismatchedDimensions { rows, labels } => {
                write!(f, "{} feature rows but {} labels", rows, labels)
            }
            BoostingError::NonBinaryLabel(l) => {
                write!(f, "Label {} is not binary (expected 0 or 1)", l)
            }
            BoostingError::Tree(e) => write!(f, "Tree fit failed: {}", e),
        }
    }
}

impl Error for BoostingError {}

impl From<TreeError> for BoostingError {
    fn from(e: TreeError) -> Self {
        BoostingError::Tree(e)
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoostingParams<F: Float> {
    pub n_estimators: usize,
    pub learning_rate: F,
    pub tree: GradientTreeParams<F>,
    /// Fraction of rows drawn (without replacement) for each round.
    pub subsample: F,
    /// Fraction of features drawn for each round.
    pub colsample: F,
    /// Initial probability every row starts from.
    pub base_score: F,
    pub seed: u64,
}

impl<F: Float> Default for GradientBoostingParams<F> {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: F::from_f64_lossy(0.3),
            tree: GradientTreeParams::default(),
            subsample: F::one(),
            colsample: F::one(),
            base_score: F::from_f64_lossy(0.5),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoosting<F: Float> {
    trees: Vec<GradientTree<F>>,
    learning_rate: F,
    base_margin: F,
}

impl<F: Float> GradientBoostingParams<F> {
    pub fn validate(&self) -> Result<(), BoostingError> {
        let unit = |v: F| v > F::zero() && v <= F::one();
        if self.n_estimators == 0 {
            return Err(BoostingError::InvalidParameter(
                "n_estimators must be at least 1".into(),
            ));
        }
        if !(self.learning_rate > F::zero()) {
            return Err(BoostingError::InvalidParameter(
                "learning_rate must be positive".into(),
            ));
        }
        if !unit(self.subsample) || !unit(self.colsample) {
            return Err(BoostingError::InvalidParameter(
                "subsample and colsample must be in (0, 1]".into(),
            ));
        }
        if !(self.base_score > F::zero() && self.base_score < F::one()) {
            return Err(BoostingError::InvalidParameter(
                "base_score must be in (0, 1)".into(),
            ));
        }
        self.tree.validate()?;
        Ok(())
    }

    pub fn fit(
        &self,
        x: ArrayView2<F>,
        y: ArrayView1<usize>,
    ) -> Result<GradientBoosting<F>, BoostingError> {
        self.validate()?;
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(BoostingError::EmptyDataSet);
        }
        if n != y.len() {
            return Err(BoostingError::MismatchedDimensions {
                rows: n,
                labels: y.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&l| l > 1) {
            return Err(BoostingError::NonBinaryLabel(bad));
        }

        let targets: Array1<F> = y.mapv(|l| if l == 1 { F::one() } else { F::zero() });
        let base_margin = (self.base_score / (F::one() - self.base_score)).ln();
        let mut margin = Array1::from_elem(n, base_margin);
        let mut rng = seeded_rng(self.seed);

        let n_rows = sample_size(n, self.subsample);
        let n_cols = sample_size(x.ncols(), self.colsample);
        let hess_floor = F::from_f64_lossy(1e-16);

        let mut trees = Vec::with_capacity(self.n_estimators);
        for round in 0..self.n_estimators {
            let proba = margin.mapv(sigmoid::<F>);
            let grad = &proba - &targets;
            let hess = proba.mapv(|p| (p * (F::one() - p)).max(hess_floor));

            let rows: Vec<usize> = if n_rows == n {
                (0..n).collect()
            } else {
                index::sample(&mut rng, n, n_rows).into_vec()
            };
            let mut cols: Vec<usize> = if n_cols == x.ncols() {
                (0..x.ncols()).collect()
            } else {
                index::sample(&mut rng, x.ncols(), n_cols).into_vec()
            };
            cols.sort_unstable();

            let tree = self.tree.fit(x, grad.view(), hess.view(), &rows, &cols)?;
            margin = margin + &(tree.predict(x) * self.learning_rate);
            trees.push(tree);

            if round % 10 == 0 || round + 1 == self.n_estimators {
                debug!(round, log_loss = ?log_loss(&margin, &targets), "boosting round");
            }
        }

        Ok(GradientBoosting {
            trees,
            learning_rate: self.learning_rate,
            base_margin,
        })
    }
}

impl<F: Float> GradientBoosting<F> {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for every row.
    pub fn decision_function(&self, x: ArrayView2<F>) -> Array1<F> {
        let mut margin = Array1::from_elem(x.nrows(), self.base_margin);
        for tree in &self.trees {
            margin = margin + &(tree.predict(x) * self.learning_rate);
        }
        margin
    }

    /// Probability of class 1 for every row.
    pub fn predict_proba(&self, x: ArrayView2<F>) -> Array1<F> {
        self.decision_function(x).mapv(sigmoid::<F>)
    }

    pub fn predict(&self, x: ArrayView2<F>) -> Array1<usize> {
        let half = F::from_f64_lossy(0.5);
        self.predict_proba(x).mapv(|p| if p > half { 1 } else { 0 })
    }
}

fn sample_size<F: Float>(n: usize, fraction: F) -> usize {
    let k = (fraction * F::from_count(n)).round().to_usize().unwrap_or(n);
    k.clamp(1, n)
}

fn sigmoid<F: Float>(z: F) -> F {
    if z >= F::zero() {
        F::one() / (F::one() + (-z).exp())
    } else {
        let e = z.exp();
        e / (F::one() + e)
    }
}

fn log_loss<F: Float>(margin: &Array1<F>, targets: &Array1<F>) -> F {
    let eps = F::from_f64_lossy(1e-15);
    let total: F = margin
        .iter()
        .zip(targets.iter())
        .map(|(&m, &t)| {
            let p = sigmoid(m).max(eps).min(F::one() - eps);
            -(t * p.ln() + (F::one() - t) * (F::one() - p).ln())
        })
        .sum();
    total / F::from_count(margin.len())
}
