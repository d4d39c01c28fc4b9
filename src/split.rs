//! Stratified train/test partitioning.

use crate::dataset::{Dataset, class_counts};
use crate::error::{PipelineError, Result};
use churn_helpers::seeded_rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::info;

/// Disjoint, covering index sets. Both lists are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    pub fn train_dataset(&self, data: &Dataset) -> Result<Dataset> {
        data.subset(&self.train)
    }

    pub fn test_dataset(&self, data: &Dataset) -> Result<Dataset> {
        data.subset(&self.test)
    }
}

/// Splits `data` so each class contributes `round(size * test_fraction)`
/// rows to the test fold. Deterministic for a given seed.
pub fn stratified_split(data: &Dataset, test_fraction: f64, seed: u64) -> Result<Split> {
    let split = stratified_indices(data.labels(), test_fraction, seed)?;
    info!(
        train = split.train.len(),
        test = split.test.len(),
        classes = ?data.class_counts(),
        "stratified split"
    );
    Ok(split)
}

pub fn stratified_indices(labels: &[usize], test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Split(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    if labels.is_empty() {
        return Err(PipelineError::EmptyFold { stage: "split" });
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = seeded_rng(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for members in by_class.values_mut() {
        members.shuffle(&mut rng);
        let n_test = (members.len() as f64 * test_fraction).round() as usize;
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(PipelineError::Split(format!(
            "{} rows at test_fraction {} leave an empty fold",
            labels.len(),
            test_fraction
        )));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

/// Fraction of labels equal to 1.
pub fn positive_fraction(labels: &[usize]) -> f64 {
    let counts = class_counts(labels);
    let positives = counts.get(1).copied().unwrap_or(0);
    positives as f64 / labels.len().max(1) as f64
}
