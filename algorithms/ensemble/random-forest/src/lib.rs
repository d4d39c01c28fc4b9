use churn_helpers::{Float, seeded_rng};
use decision_tree::{DecisionTree, DecisionTreeParams, MaxFeatures, TreeError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use tracing::debug;

/// Errors that can occur while fitting a random forest.
#[derive(Debug, Clone, PartialEq)]
pub enum ForestError {
    /// n_estimators must be at least 1
    InvalidParameter(String),
    /// No rows to learn from
    EmptyDataSet,
    /// One of the member trees failed to grow
    Tree(TreeError),
}

impl Display for ForestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ForestError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            ForestError::EmptyDataSet => write!(f, "Training data is empty"),
            ForestError::Tree(e) => write!(f, "Tree fit failed: {}", e),
        }
    }
}

impl Error for ForestError {}

impl From<TreeError> for ForestError {
    fn from(e: TreeError) -> Self {
        ForestError::Tree(e)
    }
}

/// Bagged ensemble of CART classification trees.
///
/// Each tree sees a bootstrap sample of the rows (when `bootstrap` is set)
/// and a random subset of features at every split. Predictions average the
/// trees' leaf probabilities.
#[derive(Debug, Clone)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub bootstrap: bool,
    pub tree: DecisionTreeParams,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            bootstrap: true,
            tree: DecisionTreeParams {
                max_features: MaxFeatures::Sqrt,
                ..DecisionTreeParams::default()
            },
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest<F: Float> {
    trees: Vec<DecisionTree<F>>,
    n_classes: usize,
}

impl RandomForestParams {
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.n_estimators == 0 {
            return Err(ForestError::InvalidParameter(
                "n_estimators must be at least 1".into(),
            ));
        }
        self.tree.validate()?;
        Ok(())
    }

    pub fn fit<F: Float>(
        &self,
        x: ArrayView2<F>,
        y: ArrayView1<usize>,
    ) -> Result<RandomForest<F>, ForestError> {
        self.validate()?;
        let n = x.nrows();
        if n == 0 {
            return Err(ForestError::EmptyDataSet);
        }
        let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
        let mut rng = seeded_rng(self.seed);
        let all_rows: Vec<usize> = (0..n).collect();

        let mut trees = Vec::with_capacity(self.n_estimators);
        for i in 0..self.n_estimators {
            let rows: Vec<usize> = if self.bootstrap {
                (0..n).map(|_| rng.random_range(0..n)).collect()
            } else {
                all_rows.clone()
            };
            let tree = self.tree.fit_rows(x, y, n_classes, &rows, &mut rng)?;
            debug!(tree = i, nodes = tree.n_nodes(), depth = tree.depth(), "grew tree");
            trees.push(tree);
        }

        Ok(RandomForest { trees, n_classes })
    }
}

impl<F: Float> RandomForest<F> {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the member trees' class probabilities.
    pub fn predict_proba(&self, x: ArrayView2<F>) -> Array2<F> {
        let mut acc = Array2::zeros((x.nrows(), self.n_classes));
        for tree in &self.trees {
            acc += &tree.predict_proba(x);
        }
        acc / F::from_count(self.trees.len())
    }

    /// Most probable class per row; ties go to the lower class.
    pub fn predict(&self, x: ArrayView2<F>) -> Array1<usize> {
        let proba = self.predict_proba(x);
        proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (c, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = c;
                    }
                }
                best
            })
            .collect()
    }
}
