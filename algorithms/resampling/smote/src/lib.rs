//! Synthetic minority oversampling (SMOTE).
//!
//! Every class smaller than the largest one is grown to the majority count
//! with points interpolated between a real member and one of its nearest
//! same-class neighbours. Original points are returned untouched and in
//! their original order, followed by the synthetic ones.

use churn_helpers::{DataPoint, Distance, Float, group_by_label, seeded_rng};
use k_nn::{KnnError, NeighborSearch};
use ndarray::Array1;
use rand::{Rng, RngCore};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::marker::PhantomData;
use tracing::debug;

/// Errors that can occur while oversampling.
#[derive(Debug, Clone, PartialEq)]
pub enum SmoteError {
    /// k_neighbors must be at least 1
    InvalidK,
    /// Nothing to resample
    EmptyDataSet,
    /// Only one class is present, so there is no minority to grow
    SingleClass,
    /// A class has fewer than two members; neighbour interpolation is undefined
    TooFewSamples { label: String, count: usize },
    /// Feature vectors of different lengths
    MismatchedDimensions,
    /// The neighbour search failed
    Neighbors(KnnError),
}

impl Display for SmoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SmoteError::InvalidK => write!(f, "k_neighbors must be at least 1"),
            SmoteError::EmptyDataSet => write!(f, "Cannot resample an empty data set"),
            SmoteError::SingleClass => {
                write!(f, "Only one class present; nothing to balance against")
            }
            SmoteError::TooFewSamples { label, count } => write!(
                f,
                "Class {} has {} member(s); at least 2 are needed to interpolate",
                label, count
            ),
            SmoteError::MismatchedDimensions => {
                write!(f, "Data points have differing feature counts")
            }
            SmoteError::Neighbors(e) => write!(f, "Neighbour search failed: {}", e),
        }
    }
}

impl Error for SmoteError {}

impl From<KnnError> for SmoteError {
    fn from(e: KnnError) -> Self {
        SmoteError::Neighbors(e)
    }
}

/// SMOTE oversampler.
#[derive(Debug, Clone)]
pub struct Smote<F, D>
where
    F: Float,
    D: Distance<F>,
{
    k_neighbors: usize,
    distance: D,
    _float: PhantomData<F>,
}

impl<F, D> Smote<F, D>
where
    F: Float,
    D: Distance<F>,
{
    /// Creates a new oversampler that interpolates towards one of the
    /// `k_neighbors` nearest same-class points.
    ///
    /// # Errors
    ///
    /// Returns `SmoteError::InvalidK` if `k_neighbors` is 0.
    pub fn new(k_neighbors: usize, distance: D) -> Result<Self, SmoteError> {
        if k_neighbors == 0 {
            return Err(SmoteError::InvalidK);
        }
        Ok(Self {
            k_neighbors,
            distance,
            _float: PhantomData,
        })
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    /// Balances `data` using a generator seeded with `seed`.
    pub fn balance_with_seed<L>(
        &self,
        data: &[DataPoint<L, F>],
        seed: u64,
    ) -> Result<Vec<DataPoint<L, F>>, SmoteError>
    where
        L: Clone + Eq + Hash + Debug + Ord,
    {
        let mut rng = seeded_rng(seed);
        self.balance(data, &mut rng)
    }

    /// Balances `data` so every class has as many members as the largest.
    ///
    /// The effective neighbour count of a class is
    /// `min(k_neighbors, class_size - 1)`.
    pub fn balance<L, R>(
        &self,
        data: &[DataPoint<L, F>],
        rng: &mut R,
    ) -> Result<Vec<DataPoint<L, F>>, SmoteError>
    where
        L: Clone + Eq + Hash + Debug + Ord,
        R: RngCore + Rng,
    {
        if data.is_empty() {
            return Err(SmoteError::EmptyDataSet);
        }
        let n_features = data[0].features.len();
        if data.iter().any(|dp| dp.features.len() != n_features) {
            return Err(SmoteError::MismatchedDimensions);
        }

        let groups = group_by_label(data);
        if groups.len() < 2 {
            return Err(SmoteError::SingleClass);
        }
        for (label, indices) in &groups {
            if indices.len() < 2 {
                return Err(SmoteError::TooFewSamples {
                    label: format!("{:?}", label),
                    count: indices.len(),
                });
            }
        }

        let majority = groups.values().map(Vec::len).max().unwrap_or(0);
        let mut out = data.to_vec();

        for (label, indices) in &groups {
            let deficit = majority - indices.len();
            if deficit == 0 {
                continue;
            }
            let rows = indices.iter().map(|&i| data[i].features.view()).collect();
            let search = NeighborSearch::new(rows, self.distance.clone())?;
            let k = self.k_neighbors.min(indices.len() - 1);

            let mut neighbors: Vec<Vec<usize>> = Vec::with_capacity(indices.len());
            for local in 0..indices.len() {
                let found = search.query_indexed(local, k)?;
                neighbors.push(found.into_iter().map(|n| n.index).collect());
            }

            debug!(
                class = ?label,
                members = indices.len(),
                synthetic = deficit,
                k,
                "oversampling class"
            );

            for _ in 0..deficit {
                let local = rng.random_range(0..indices.len());
                let candidates = &neighbors[local];
                let neighbor = candidates[rng.random_range(0..candidates.len())];
                let gap = F::from_f64_lossy(rng.random::<f64>());

                let base = &data[indices[local]].features;
                let toward = &data[indices[neighbor]].features;
                let synthetic: Array1<F> = base + &((toward - base) * gap);
                out.push(DataPoint::new(synthetic, label.clone()));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use churn_helpers::L2Dist;
    use ndarray::array;
    use std::collections::HashMap;

    fn imbalanced(n_major: usize, n_minor: usize) -> Vec<DataPoint<usize, f64>> {
        let mut v = Vec::new();
        for i in 0..n_major {
            let x = i as f64 * 0.1;
            v.push(DataPoint::new(array![x, -x], 0));
        }
        for i in 0..n_minor {
            let x = 10.0 + i as f64;
            v.push(DataPoint::new(array![x, x * 2.0], 1));
        }
        v
    }

    fn counts(data: &[DataPoint<usize, f64>]) -> HashMap<usize, usize> {
        let mut m = HashMap::new();
        for dp in data {
            *m.entry(dp.label).or_insert(0) += 1;
        }
        m
    }

    #[test]
    fn test_balance_90_10() {
        let data = imbalanced(90, 10);
        let smote = Smote::new(5, L2Dist).unwrap();
        let balanced = smote.balance_with_seed(&data, 42).unwrap();

        let c = counts(&balanced);
        assert_eq!(c[&0], 90);
        assert_eq!(c[&1], 90);
        assert_eq!(balanced.len(), 180);
        // originals pass through unchanged and in order
        assert_eq!(&balanced[..100], &data[..]);
    }

    #[test]
    fn test_synthetic_points_lie_within_minority_hull() {
        let data = imbalanced(30, 4);
        let smote = Smote::new(5, L2Dist).unwrap();
        let balanced = smote.balance_with_seed(&data, 7).unwrap();

        for dp in &balanced[34..] {
            assert_eq!(dp.label, 1);
            let x = dp.features[0];
            assert!((10.0..=13.0).contains(&x));
            // every minority point satisfies y = 2x, and so does any interpolation
            assert!((dp.features[1] - 2.0 * x).abs() < 1e-9);
        }
    }

    #[test]
    fn test_already_balanced_is_identity() {
        let data = imbalanced(5, 5);
        let smote = Smote::new(3, L2Dist).unwrap();
        let balanced = smote.balance_with_seed(&data, 1).unwrap();
        assert_eq!(balanced, data);
    }

    #[test]
    fn test_same_seed_same_output() {
        let data = imbalanced(20, 3);
        let smote = Smote::new(5, L2Dist).unwrap();
        let a = smote.balance_with_seed(&data, 42).unwrap();
        let b = smote.balance_with_seed(&data, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multiclass_all_raised_to_majority() {
        let mut data = imbalanced(12, 4);
        data.push(DataPoint::new(array![-5.0, -5.0], 2));
        data.push(DataPoint::new(array![-6.0, -5.0], 2));
        let smote = Smote::new(5, L2Dist).unwrap();
        let c = counts(&smote.balance_with_seed(&data, 3).unwrap());
        assert_eq!(c[&0], 12);
        assert_eq!(c[&1], 12);
        assert_eq!(c[&2], 12);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            Smote::<f64, L2Dist>::new(0, L2Dist).unwrap_err(),
            SmoteError::InvalidK
        );

        let smote = Smote::new(5, L2Dist).unwrap();
        let empty: Vec<DataPoint<usize, f64>> = vec![];
        assert_eq!(
            smote.balance_with_seed(&empty, 0).unwrap_err(),
            SmoteError::EmptyDataSet
        );

        let single = imbalanced(4, 0);
        assert_eq!(
            smote.balance_with_seed(&single, 0).unwrap_err(),
            SmoteError::SingleClass
        );

        let lonely = imbalanced(4, 1);
        assert!(matches!(
            smote.balance_with_seed(&lonely, 0),
            Err(SmoteError::TooFewSamples { count: 1, .. })
        ));

        let ragged = vec![
            DataPoint::new(array![1.0, 2.0], 0usize),
            DataPoint::new(array![1.0], 1usize),
        ];
        assert_eq!(
            smote.balance_with_seed(&ragged, 0).unwrap_err(),
            SmoteError::MismatchedDimensions
        );
    }

    #[test]
    fn test_custom_rng() {
        use rand::SeedableRng;
        use rand_xoshiro::Xoshiro256PlusPlus;

        let data = imbalanced(10, 2);
        let smote = Smote::new(1, L2Dist).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let balanced = smote.balance(&data, &mut rng).unwrap();
        assert_eq!(counts(&balanced)[&1], 10);
    }
}
