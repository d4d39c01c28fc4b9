use crate::{MaxFeatures, Tree, TreeError, check_finite, midpoint, sort_by_feature};
use churn_helpers::{Float, seeded_rng};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

/// Hyperparameters of a CART classification tree.
#[derive(Debug, Clone)]
pub struct DecisionTreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for DecisionTreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            seed: 0,
        }
    }
}

/// A fitted classification tree. Leaves store class probabilities.
#[derive(Debug, Clone)]
pub struct DecisionTree<F: Float> {
    tree: Tree<F, Vec<F>>,
    n_classes: usize,
}

impl DecisionTreeParams {
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.min_samples_split < 2 {
            return Err(TreeError::InvalidParameter(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(TreeError::InvalidParameter(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(TreeError::InvalidParameter(
                "max_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fits on every row of `x`. The class count is `max(y) + 1`.
    pub fn fit<F: Float>(
        &self,
        x: ArrayView2<F>,
        y: ArrayView1<usize>,
    ) -> Result<DecisionTree<F>, TreeError> {
        let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = seeded_rng(self.seed);
        self.fit_rows(x, y, n_classes, &rows, &mut rng)
    }

    /// Fits on the listed rows of `x` (duplicates allowed, as in a bootstrap
    /// sample). Feature sub-sampling draws from `rng`.
    pub fn fit_rows<F: Float, R: RngCore + Rng>(
        &self,
        x: ArrayView2<F>,
        y: ArrayView1<usize>,
        n_classes: usize,
        rows: &[usize],
        rng: &mut R,
    ) -> Result<DecisionTree<F>, TreeError> {
        self.validate()?;
        if rows.is_empty() || x.ncols() == 0 {
            return Err(TreeError::EmptyDataSet);
        }
        if x.nrows() != y.len() {
            return Err(TreeError::MismatchedDimensions {
                rows: x.nrows(),
                targets: y.len(),
            });
        }
        let columns: Vec<usize> = (0..x.ncols()).collect();
        check_finite(x, rows, &columns)?;
        if let Some(&label) = rows.iter().map(|&r| &y[r]).find(|&&l| l >= n_classes) {
            return Err(TreeError::LabelOutOfRange { label, n_classes });
        }

        let mut builder = Builder {
            params: self,
            x,
            y,
            n_classes,
            n_try: self.max_features.resolve(x.ncols()),
            rng,
            tree: Tree::new(),
        };
        builder.build(rows.to_vec(), 0);

        Ok(DecisionTree {
            tree: builder.tree,
            n_classes,
        })
    }
}

impl<F: Float> DecisionTree<F> {
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_nodes(&self) -> usize {
        self.tree.n_nodes()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Class probabilities of the leaf a single row lands in.
    pub fn predict_row_proba(&self, row: ArrayView1<F>) -> &[F] {
        self.tree.leaf_for(row)
    }

    /// Class probabilities for every row, shape `(n_rows, n_classes)`.
    pub fn predict_proba(&self, x: ArrayView2<F>) -> Array2<F> {
        let mut out = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (c, &p) in self.predict_row_proba(row).iter().enumerate() {
                out[[i, c]] = p;
            }
        }
        out
    }

    /// Most probable class per row; ties go to the lower class.
    pub fn predict(&self, x: ArrayView2<F>) -> Array1<usize> {
        x.rows()
            .into_iter()
            .map(|row| argmax(self.predict_row_proba(row)))
            .collect()
    }
}

pub(crate) fn argmax<F: Float>(values: &[F]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

struct Builder<'a, 'x, 'y, F: Float, R> {
    params: &'a DecisionTreeParams,
    x: ArrayView2<'x, F>,
    y: ArrayView1<'y, usize>,
    n_classes: usize,
    n_try: usize,
    rng: &'a mut R,
    tree: Tree<F, Vec<F>>,
}

impl<F: Float, R: RngCore + Rng> Builder<'_, '_, '_, F, R> {
    fn counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &r in rows {
            counts[self.y[r]] += 1;
        }
        counts
    }

    fn distribution(&self, counts: &[usize], n: usize) -> Vec<F> {
        let total = F::from_count(n);
        counts.iter().map(|&c| F::from_count(c) / total).collect()
    }

    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let counts = self.counts(&rows);
        let n = rows.len();
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);

        if pure || depth_reached || n < self.params.min_samples_split {
            let dist = self.distribution(&counts, n);
            return self.tree.push_leaf(dist);
        }

        let Some((feature, threshold)) = self.best_split(&rows, &counts) else {
            let dist = self.distribution(&counts, n);
            return self.tree.push_leaf(dist);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x[[r, feature]] <= threshold);

        let id = self.tree.reserve(Vec::new());
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.tree.set_split(id, feature, threshold, left, right);
        id
    }

    /// Weighted Gini of one side: `n * (1 - sum p^2)`, kept unnormalised so
    /// sides can be added directly.
    fn weighted_gini(counts: &[usize], n: usize) -> F {
        if n == 0 {
            return F::zero();
        }
        let total = F::from_count(n);
        let sum_sq: F = counts
            .iter()
            .map(|&c| {
                let p = F::from_count(c) / total;
                p * p
            })
            .sum();
        total * (F::one() - sum_sq)
    }

    /// Searches up to `n_try` non-constant features in random order for the
    /// split with the lowest weighted child impurity.
    fn best_split(&mut self, rows: &[usize], counts: &[usize]) -> Option<(usize, F)> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf;
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<(F, usize, F)> = None;
        let mut visited = 0;
        let mut order = rows.to_vec();

        for &f in &features {
            if visited >= self.n_try {
                break;
            }
            sort_by_feature(self.x, &mut order, f);
            if self.x[[order[0], f]] == self.x[[order[n - 1], f]] {
                continue;
            }
            visited += 1;

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();
            for pos in 1..n {
                let prev = order[pos - 1];
                left[self.y[prev]] += 1;
                right[self.y[prev]] -= 1;
                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = self.x[[prev, f]];
                let hi = self.x[[order[pos], f]];
                if lo == hi {
                    continue;
                }
                let score = Self::weighted_gini(&left, pos) + Self::weighted_gini(&right, n - pos);
                if best.is_none_or(|(s, _, _)| score < s) {
                    best = Some((score, f, midpoint(lo, hi)));
                }
            }
        }

        best.map(|(_, f, t)| (f, t))
    }
}
