use crate::{Tree, TreeError, check_finite, midpoint, sort_by_feature};
use churn_helpers::Float;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Hyperparameters of a second-order regression tree.
///
/// Leaf scores are `-G / (H + lambda)` where `G` and `H` are the summed
/// gradients and hessians of the rows in the leaf. A split is kept only when
/// its gain exceeds zero after subtracting `gamma`.
#[derive(Debug, Clone)]
pub struct GradientTreeParams<F: Float> {
    pub max_depth: usize,
    pub lambda: F,
    pub gamma: F,
    pub min_child_weight: F,
}

impl<F: Float> Default for GradientTreeParams<F> {
    fn default() -> Self {
        Self {
            max_depth: 6,
            lambda: F::one(),
            gamma: F::zero(),
            min_child_weight: F::one(),
        }
    }
}

/// A fitted gradient tree. Leaves store additive scores.
#[derive(Debug, Clone)]
pub struct GradientTree<F: Float> {
    tree: Tree<F, F>,
}

impl<F: Float> GradientTreeParams<F> {
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.max_depth == 0 {
            return Err(TreeError::InvalidParameter(
                "max_depth must be at least 1".into(),
            ));
        }
        if self.lambda < F::zero() || self.gamma < F::zero() || self.min_child_weight < F::zero() {
            return Err(TreeError::InvalidParameter(
                "lambda, gamma and min_child_weight must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Grows a tree on the listed rows, considering only `features`.
    pub fn fit(
        &self,
        x: ArrayView2<F>,
        grad: ArrayView1<F>,
        hess: ArrayView1<F>,
        rows: &[usize],
        features: &[usize],
    ) -> Result<GradientTree<F>, TreeError> {
        self.validate()?;
        if rows.is_empty() || features.is_empty() {
            return Err(TreeError::EmptyDataSet);
        }
        if x.nrows() != grad.len() || x.nrows() != hess.len() {
            return Err(TreeError::MismatchedDimensions {
                rows: x.nrows(),
                targets: grad.len().min(hess.len()),
            });
        }
        check_finite(x, rows, features)?;

        let mut builder = Builder {
            params: self,
            x,
            grad,
            hess,
            features,
            tree: Tree::new(),
        };
        builder.build(rows.to_vec(), 0);
        Ok(GradientTree { tree: builder.tree })
    }
}

impl<F: Float> GradientTree<F> {
    pub fn n_nodes(&self) -> usize {
        self.tree.n_nodes()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub fn predict_row(&self, row: ArrayView1<F>) -> F {
        *self.tree.leaf_for(row)
    }

    pub fn predict(&self, x: ArrayView2<F>) -> Array1<F> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

struct Builder<'a, 'x, 'g, 'h, F: Float> {
    params: &'a GradientTreeParams<F>,
    x: ArrayView2<'x, F>,
    grad: ArrayView1<'g, F>,
    hess: ArrayView1<'h, F>,
    features: &'a [usize],
    tree: Tree<F, F>,
}

impl<F: Float> Builder<'_, '_, '_, '_, F> {
    fn score(&self, g: F, h: F) -> F {
        g * g / (h + self.params.lambda)
    }

    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: F = rows.iter().map(|&r| self.grad[r]).sum();
        let h: F = rows.iter().map(|&r| self.hess[r]).sum();
        let leaf = -g / (h + self.params.lambda);

        if depth >= self.params.max_depth || rows.len() < 2 {
            return self.tree.push_leaf(leaf);
        }

        let Some((feature, threshold)) = self.best_split(&rows, g, h) else {
            return self.tree.push_leaf(leaf);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x[[r, feature]] <= threshold);

        let id = self.tree.reserve(F::zero());
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.tree.set_split(id, feature, threshold, left, right);
        id
    }

    fn best_split(&self, rows: &[usize], g: F, h: F) -> Option<(usize, F)> {
        let n = rows.len();
        let half = F::from_f64_lossy(0.5);
        let parent = self.score(g, h);
        let mut best: Option<(F, usize, F)> = None;
        let mut order = rows.to_vec();

        for &f in self.features {
            sort_by_feature(self.x, &mut order, f);
            let mut gl = F::zero();
            let mut hl = F::zero();
            for pos in 1..n {
                let prev = order[pos - 1];
                gl += self.grad[prev];
                hl += self.hess[prev];
                let lo = self.x[[prev, f]];
                let hi = self.x[[order[pos], f]];
                if lo == hi {
                    continue;
                }
                let gr = g - gl;
                let hr = h - hl;
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = half * (self.score(gl, hl) + self.score(gr, hr) - parent)
                    - self.params.gamma;
                if gain > F::zero() && best.is_none_or(|(b, _, _)| gain > b) {
                    best = Some((gain, f, midpoint(lo, hi)));
                }
            }
        }

        best.map(|(_, f, t)| (f, t))
    }
}
