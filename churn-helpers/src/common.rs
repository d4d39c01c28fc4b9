use ndarray::Array1;
use crate::Float;
use std::collections::BTreeMap;
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Represents a single data point with features and a label.
///
/// L: The type of the label (e.g., String, usize, enum).
/// F: The float type for the features (e.g., f32, f64).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct DataPoint<L, F>
where
    L: Clone + Eq + std::hash::Hash + Debug,
    F: Float,
{
    pub features: Array1<F>,
    pub label: L,
}

impl<L, F> DataPoint<L, F>
where
    L: Clone + Eq + std::hash::Hash + Debug,
    F: Float,
{
    pub fn new(features: Array1<F>, label: L) -> Self {
        DataPoint { features, label }
    }
}

/// Groups the indices of `data` by label. Labels come back in sorted order
/// so callers iterate classes deterministically.
pub fn group_by_label<L, F>(data: &[DataPoint<L, F>]) -> BTreeMap<L, Vec<usize>>
where
    L: Clone + Eq + std::hash::Hash + Debug + Ord,
    F: Float,
{
    let mut map: BTreeMap<L, Vec<usize>> = BTreeMap::new();
    for (i, dp) in data.iter().enumerate() {
        map.entry(dp.label.clone()).or_default().push(i);
    }
    map
}
