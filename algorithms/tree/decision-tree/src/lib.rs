//! Binary decision trees over dense `ndarray` feature matrices.
//!
//! Two learners share one node arena:
//! * [`DecisionTreeParams`] grows a CART classification tree with the Gini
//!   criterion; leaves hold class probabilities.
//! * [`GradientTreeParams`] grows a regression tree on first and second
//!   order loss gradients; leaves hold an additive score.
//!
//! Rows go left when `x[feature] <= threshold`.

use churn_helpers::Float;
use ndarray::{ArrayView1, ArrayView2};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

mod classifier;
mod gradient;

pub use classifier::{DecisionTree, DecisionTreeParams};
pub use gradient::{GradientTree, GradientTreeParams};

/// Errors that can occur while growing a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// No rows to learn from.
    EmptyDataSet,
    /// Feature rows and targets disagree in length.
    MismatchedDimensions { rows: usize, targets: usize },
    /// A feature value is NaN or infinite.
    NonFiniteFeature { row: usize, column: usize },
    /// A label is not below the declared class count.
    LabelOutOfRange { label: usize, n_classes: usize },
    /// A row or feature index passed in does not exist.
    IndexOutOfBounds(usize),
    /// A hyperparameter is out of range.
    InvalidParameter(String),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::EmptyDataSet => write!(f, "Training data is empty"),
            TreeError::MismatchedDimensions { rows, targets } => {
                write!(f, "{} feature rows but {} targets", rows, targets)
            }
            TreeError::NonFiniteFeature { row, column } => {
                write!(f, "Non-finite feature value at row {}, column {}", row, column)
            }
            TreeError::LabelOutOfRange { label, n_classes } => {
                write!(f, "Label {} out of range for {} classes", label, n_classes)
            }
            TreeError::IndexOutOfBounds(i) => write!(f, "Index {} out of bounds", i),
            TreeError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl Error for TreeError {}

/// How many features a split search may examine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
}

impl MaxFeatures {
    /// Number of features to try for a matrix with `n_features` columns;
    /// always at least 1 and at most `n_features`.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Count(c) => *c,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node<F, V> {
    Leaf(V),
    Split {
        feature: usize,
        threshold: F,
        left: usize,
        right: usize,
    },
}

/// Node arena; the root is node 0.
#[derive(Debug, Clone)]
pub(crate) struct Tree<F, V> {
    nodes: Vec<Node<F, V>>,
}

impl<F: Float, V> Tree<F, V> {
    fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push_leaf(&mut self, value: V) -> usize {
        self.nodes.push(Node::Leaf(value));
        self.nodes.len() - 1
    }

    /// Reserves a slot for a split whose children are not built yet.
    fn reserve(&mut self, value: V) -> usize {
        self.push_leaf(value)
    }

    fn set_split(&mut self, id: usize, feature: usize, threshold: F, left: usize, right: usize) {
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
    }

    fn leaf_for(&self, row: ArrayView1<F>) -> &V {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf(v) => return v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn depth(&self) -> usize {
        fn walk<F, V>(nodes: &[Node<F, V>], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

/// Rejects NaN / infinite values in the rows and columns a learner will read.
pub(crate) fn check_finite<F: Float>(
    x: ArrayView2<F>,
    rows: &[usize],
    columns: &[usize],
) -> Result<(), TreeError> {
    for &r in rows {
        if r >= x.nrows() {
            return Err(TreeError::IndexOutOfBounds(r));
        }
        for &c in columns {
            if c >= x.ncols() {
                return Err(TreeError::IndexOutOfBounds(c));
            }
            if !x[[r, c]].is_finite() {
                return Err(TreeError::NonFiniteFeature { row: r, column: c });
            }
        }
    }
    Ok(())
}

/// Midpoint between two consecutive sorted values, never equal to the
/// upper one so `<=` keeps the lower value on the left.
pub(crate) fn midpoint<F: Float>(lo: F, hi: F) -> F {
    let mid = (lo + hi) / F::from_f64_lossy(2.0);
    if mid >= hi { lo } else { mid }
}

/// Sorts `rows` by the values of column `feature`.
pub(crate) fn sort_by_feature<F: Float>(x: ArrayView2<F>, rows: &mut [usize], feature: usize) {
    rows.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
