//! The model registry: tagged classifier variants behind one fit/predict contract.

use crate::error::{PipelineError, Result};
use decision_tree::{DecisionTreeParams, GradientTreeParams, MaxFeatures};
use gradient_boosting::{GradientBoosting, GradientBoostingParams};
use logistic_regression::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, ArrayView1, ArrayView2};
use random_forest::{RandomForest, RandomForestParams};
use serde::Deserialize;
use tracing::info;

/// L2-regularised logistic regression.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// Inverse regularisation strength.
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 1.0,
            max_iter: 500,
            tolerance: 1e-4,
        }
    }
}

/// Feature sub-sampling rule for forest splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeaturesSetting {
    All,
    Sqrt,
    Log2,
    Count(usize),
}

impl From<MaxFeaturesSetting> for MaxFeatures {
    fn from(setting: MaxFeaturesSetting) -> Self {
        match setting {
            MaxFeaturesSetting::All => MaxFeatures::All,
            MaxFeaturesSetting::Sqrt => MaxFeatures::Sqrt,
            MaxFeaturesSetting::Log2 => MaxFeatures::Log2,
            MaxFeaturesSetting::Count(n) => MaxFeatures::Count(n),
        }
    }
}

/// Bagged CART ensemble.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnsembleParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeaturesSetting,
    pub bootstrap: bool,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeaturesSetting::Sqrt,
            bootstrap: true,
        }
    }
}

/// Gradient-boosted trees on the logistic loss.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoostedParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub subsample: f64,
    pub colsample: f64,
    pub base_score: f64,
}

impl Default for BoostedParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            colsample: 1.0,
            base_score: 0.5,
        }
    }
}

/// Which classifier a variant trains, with its hyperparameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Linear(LinearParams),
    Ensemble(EnsembleParams),
    Boosted(BoostedParams),
}

/// A named entry of the model registry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelVariant {
    pub name: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(flatten)]
    pub kind: ModelKind,
}

fn default_seed() -> u64 {
    42
}

/// A trained classifier. Consumed by one batch of predictions.
#[derive(Debug, Clone)]
pub enum FittedModel {
    Linear(FittedLogisticRegression<f64>),
    Ensemble(RandomForest<f64>),
    Boosted(GradientBoosting<f64>),
}

impl ModelVariant {
    pub fn new(name: impl Into<String>, seed: u64, kind: ModelKind) -> Self {
        Self {
            name: name.into(),
            seed,
            kind,
        }
    }

    /// The three variants trained by default, in report order.
    pub fn default_registry() -> Vec<ModelVariant> {
        vec![
            ModelVariant::new(
                "Logistic Regression",
                42,
                ModelKind::Linear(LinearParams::default()),
            ),
            ModelVariant::new(
                "Random Forest",
                42,
                ModelKind::Ensemble(EnsembleParams::default()),
            ),
            ModelVariant::new(
                "Gradient Boosting",
                42,
                ModelKind::Boosted(BoostedParams::default()),
            ),
        ]
    }

    fn linear(p: &LinearParams) -> LogisticRegression<f64> {
        LogisticRegression::new()
            .c(p.c)
            .learning_rate(p.learning_rate)
            .max_iter(p.max_iter)
            .tolerance(p.tolerance)
    }

    fn forest(&self, p: &EnsembleParams) -> RandomForestParams {
        RandomForestParams {
            n_estimators: p.n_estimators,
            bootstrap: p.bootstrap,
            tree: DecisionTreeParams {
                max_depth: p.max_depth,
                min_samples_split: p.min_samples_split,
                min_samples_leaf: p.min_samples_leaf,
                max_features: p.max_features.into(),
                seed: self.seed,
            },
            seed: self.seed,
        }
    }

    fn boosting(&self, p: &BoostedParams) -> GradientBoostingParams<f64> {
        GradientBoostingParams {
            n_estimators: p.n_estimators,
            learning_rate: p.learning_rate,
            tree: GradientTreeParams {
                max_depth: p.max_depth,
                lambda: p.lambda,
                gamma: p.gamma,
                min_child_weight: p.min_child_weight,
            },
            subsample: p.subsample,
            colsample: p.colsample,
            base_score: p.base_score,
            seed: self.seed,
        }
    }

    /// Checks the hyperparameters without training.
    pub fn validate(&self) -> Result<()> {
        let outcome = match &self.kind {
            ModelKind::Linear(p) => Self::linear(p).validate().map_err(|e| e.to_string()),
            ModelKind::Ensemble(p) => self.forest(p).validate().map_err(|e| e.to_string()),
            ModelKind::Boosted(p) => self.boosting(p).validate().map_err(|e| e.to_string()),
        };
        outcome.map_err(|reason| {
            PipelineError::Config(format!("model `{}`: {}", self.name, reason))
        })
    }

    /// Trains a fresh classifier on `x` / `y`.
    pub fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<FittedModel> {
        info!(model = %self.name, rows = x.nrows(), features = x.ncols(), "fitting model");
        let fit_error = |reason: String| PipelineError::ModelFit {
            model: self.name.clone(),
            reason,
        };
        let fitted = match &self.kind {
            ModelKind::Linear(p) => {
                let model = Self::linear(p)
                    .fit(x, y)
                    .map_err(|e| fit_error(e.to_string()))?;
                info!(model = %self.name, iterations = model.n_iter, "logistic regression fitted");
                FittedModel::Linear(model)
            }
            ModelKind::Ensemble(p) => FittedModel::Ensemble(
                self.forest(p)
                    .fit(x, y)
                    .map_err(|e| fit_error(e.to_string()))?,
            ),
            ModelKind::Boosted(p) => FittedModel::Boosted(
                self.boosting(p)
                    .fit(x, y)
                    .map_err(|e| fit_error(e.to_string()))?,
            ),
        };
        Ok(fitted)
    }
}

impl FittedModel {
    pub fn predict(&self, x: ArrayView2<f64>) -> Array1<usize> {
        match self {
            FittedModel::Linear(m) => m.predict(x),
            FittedModel::Ensemble(m) => m.predict(x),
            FittedModel::Boosted(m) => m.predict(x),
        }
    }
}
