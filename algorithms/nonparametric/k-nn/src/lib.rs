use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
// These are the core components from our shared library.
use churn_helpers::{DataPoint, Distance, Float};

use ndarray::ArrayView1;

/// Errors that can occur when searching for nearest neighbours.
#[derive(Debug, Clone, PartialEq)]
pub enum KnnError {
    /// k cannot be zero for a neighbour query
    InvalidK,
    /// Cannot query an index built from no points
    EmptyIndex,
    /// Invalid distance comparison (likely due to NaN values in data)
    InvalidDistance,
    /// The query point index does not exist in the index
    IndexOutOfBounds(usize),
}

impl Display for KnnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KnnError::InvalidK => write!(f, "k cannot be zero for a neighbour query"),
            KnnError::EmptyIndex => write!(f, "Cannot query an empty neighbour index"),
            KnnError::InvalidDistance => write!(
                f,
                "Invalid distance comparison (likely due to NaN values in data)"
            ),
            KnnError::IndexOutOfBounds(i) => {
                write!(f, "Point index {} is outside the neighbour index", i)
            }
        }
    }
}

impl Error for KnnError {}

/// One result of a neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<F: Float> {
    /// Position of the neighbour in the indexed rows.
    pub index: usize,
    /// True (not reduced) distance to the query.
    pub distance: F,
}

/// Brute-force k-nearest-neighbour search.
///
/// Every query scans all indexed rows with the reduced distance of `D` and
/// keeps the `k` closest. Ties are broken by row position so results are
/// deterministic.
///
/// # Type Parameters
///
/// * `F`: The float type for the features (e.g., `f32`, `f64`).
/// * `D`: The distance metric, which must implement the `Distance` trait.
#[derive(Debug, Clone)]
pub struct NeighborSearch<'a, F, D>
where
    F: Float,
    D: Distance<F>,
{
    rows: Vec<ArrayView1<'a, F>>,
    distance: D,
}

impl<'a, F, D> NeighborSearch<'a, F, D>
where
    F: Float,
    D: Distance<F>,
{
    /// Builds an index over borrowed feature rows.
    ///
    /// # Errors
    ///
    /// Returns `KnnError::EmptyIndex` if `rows` is empty.
    pub fn new(rows: Vec<ArrayView1<'a, F>>, distance: D) -> Result<Self, KnnError> {
        if rows.is_empty() {
            return Err(KnnError::EmptyIndex);
        }
        Ok(Self { rows, distance })
    }

    /// Builds an index over the features of a slice of data points.
    pub fn from_points<L>(points: &'a [DataPoint<L, F>], distance: D) -> Result<Self, KnnError>
    where
        L: Clone + Eq + std::hash::Hash + Debug,
    {
        Self::new(points.iter().map(|dp| dp.features.view()).collect(), distance)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the `k` rows closest to `features`, nearest first.
    ///
    /// If `k` exceeds the number of indexed rows, every row is returned.
    pub fn query(&self, features: ArrayView1<F>, k: usize) -> Result<Vec<Neighbor<F>>, KnnError> {
        self.nearest(features, k, None)
    }

    /// Returns the `k` rows closest to the indexed row `index`, excluding the
    /// row itself.
    pub fn query_indexed(&self, index: usize, k: usize) -> Result<Vec<Neighbor<F>>, KnnError> {
        let row = *self
            .rows
            .get(index)
            .ok_or(KnnError::IndexOutOfBounds(index))?;
        self.nearest(row, k, Some(index))
    }

    fn nearest(
        &self,
        features: ArrayView1<F>,
        k: usize,
        exclude: Option<usize>,
    ) -> Result<Vec<Neighbor<F>>, KnnError> {
        if k == 0 {
            return Err(KnnError::InvalidK);
        }

        let mut distances: Vec<(F, usize)> = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            if Some(i) == exclude {
                continue;
            }
            let d = self.distance.rdistance(*row, features);
            if d.is_nan() {
                return Err(KnnError::InvalidDistance);
            }
            distances.push((d, i));
        }

        // NaN was rejected above, so partial_cmp never fails here.
        distances.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        distances.truncate(k);

        Ok(distances
            .into_iter()
            .map(|(rdist, index)| Neighbor {
                index,
                distance: self.distance.rdist_to_dist(rdist),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use churn_helpers::L2Dist;
    use ndarray::array;

    fn points() -> Vec<DataPoint<&'static str, f64>> {
        vec![
            DataPoint::new(array![1.0, 1.0], "A"),
            DataPoint::new(array![2.0, 2.0], "A"),
            DataPoint::new(array![1.0, 2.0], "A"),
            DataPoint::new(array![8.0, 8.0], "B"),
            DataPoint::new(array![9.0, 8.0], "B"),
            DataPoint::new(array![8.0, 9.0], "B"),
        ]
    }

    #[test]
    fn test_query_returns_closest_first() {
        let data = points();
        let search = NeighborSearch::from_points(&data, L2Dist).unwrap();

        let result = search.query(array![8.1, 8.1].view(), 3).unwrap();
        let indices: Vec<usize> = result.iter().map(|n| n.index).collect();
        assert_eq!(indices[0], 3);
        assert!(indices.contains(&4));
        assert!(indices.contains(&5));
        assert!(result.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_query_indexed_excludes_self() {
        let data = points();
        let search = NeighborSearch::from_points(&data, L2Dist).unwrap();

        let result = search.query_indexed(0, 2).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|n| n.index != 0));
        // (1,2) is at distance 1, (2,2) at sqrt(2)
        assert_eq!(result[0].index, 2);
        assert_abs_diff_eq!(result[0].distance, 1.0);
        assert_abs_diff_eq!(result[1].distance, 2.0f64.sqrt());
    }

    #[test]
    fn test_k_larger_than_index() {
        let data = points();
        let search = NeighborSearch::from_points(&data, L2Dist).unwrap();
        assert_eq!(search.query(array![0.0, 0.0].view(), 50).unwrap().len(), 6);
        assert_eq!(search.query_indexed(1, 50).unwrap().len(), 5);
    }

    #[test]
    fn test_ties_break_by_position() {
        let data = vec![
            DataPoint::new(array![1.0], ()),
            DataPoint::new(array![-1.0], ()),
        ];
        let search = NeighborSearch::from_points(&data, L2Dist).unwrap();
        let result = search.query(array![0.0].view(), 2).unwrap();
        assert_eq!(result[0].index, 0);
        assert_eq!(result[1].index, 1);
    }

    #[test]
    fn test_errors() {
        let empty: Vec<DataPoint<&str, f64>> = vec![];
        assert!(matches!(
            NeighborSearch::from_points(&empty, L2Dist),
            Err(KnnError::EmptyIndex)
        ));

        let data = points();
        let search = NeighborSearch::from_points(&data, L2Dist).unwrap();
        assert_eq!(
            search.query(array![0.0, 0.0].view(), 0).unwrap_err(),
            KnnError::InvalidK
        );
        assert_eq!(
            search.query_indexed(10, 1).unwrap_err(),
            KnnError::IndexOutOfBounds(10)
        );

        let nan = vec![DataPoint::new(array![f64::NAN], "A")];
        let search = NeighborSearch::from_points(&nan, L2Dist).unwrap();
        assert_eq!(
            search.query(array![0.0].view(), 1).unwrap_err(),
            KnnError::InvalidDistance
        );
    }
}
