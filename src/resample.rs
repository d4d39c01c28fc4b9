//! SMOTE balancing of the transformed training fold.

use crate::dataset::class_counts;
use crate::error::{PipelineError, Result};
use crate::transform::FeatureMatrix;
use churn_helpers::{DataPoint, L2Dist};
use ndarray::Array2;
use smote::Smote;
use tracing::info;

/// Training rows after balancing; every class has the majority count.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedTrainingSet {
    pub features: FeatureMatrix,
    pub labels: Vec<usize>,
}

impl BalancedTrainingSet {
    pub fn class_counts(&self) -> Vec<usize> {
        class_counts(&self.labels)
    }
}

/// Class counts of the training fold before and after balancing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSummary {
    pub before: Vec<usize>,
    pub after: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Resampler {
    smote: Smote<f64, L2Dist>,
}

impl Resampler {
    pub fn new(k_neighbors: usize) -> Result<Self> {
        Ok(Self {
            smote: Smote::new(k_neighbors, L2Dist)?,
        })
    }

    /// Oversamples every minority class of a training fold. Original rows
    /// come first, synthetic rows follow.
    pub fn balance(
        &self,
        features: &FeatureMatrix,
        labels: &[usize],
        seed: u64,
    ) -> Result<BalancedTrainingSet> {
        if features.nrows() != labels.len() {
            return Err(PipelineError::Schema {
                stage: "resample",
                column: "<label>".into(),
                row: None,
                reason: format!("{} rows but {} labels", features.nrows(), labels.len()),
            });
        }
        let points: Vec<DataPoint<usize, f64>> = features
            .rows()
            .into_iter()
            .zip(labels)
            .map(|(row, &label)| DataPoint::new(row.to_owned(), label))
            .collect();

        let balanced = self.smote.balance_with_seed(&points, seed)?;

        let n_cols = features.ncols();
        let mut flat = Vec::with_capacity(balanced.len() * n_cols);
        let mut out_labels = Vec::with_capacity(balanced.len());
        for point in balanced {
            flat.extend(point.features.iter().copied());
            out_labels.push(point.label);
        }
        let features = Array2::from_shape_vec((out_labels.len(), n_cols), flat).map_err(|e| {
            PipelineError::Schema {
                stage: "resample",
                column: "<features>".into(),
                row: None,
                reason: e.to_string(),
            }
        })?;

        let set = BalancedTrainingSet {
            features,
            labels: out_labels,
        };
        info!(
            before = ?class_counts(labels),
            after = ?set.class_counts(),
            "balanced training fold"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smote::SmoteError;

    fn imbalanced(n_major: usize, n_minor: usize) -> (FeatureMatrix, Vec<usize>) {
        let mut flat = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_major {
            flat.extend_from_slice(&[i as f64 * 0.1, 1.0, 0.0]);
            labels.push(0);
        }
        for i in 0..n_minor {
            flat.extend_from_slice(&[5.0 + i as f64 * 0.2, 0.0, 1.0]);
            labels.push(1);
        }
        let n = labels.len();
        (Array2::from_shape_vec((n, 3), flat).unwrap(), labels)
    }

    #[test]
    fn test_ninety_ten_becomes_ninety_ninety() {
        let (x, y) = imbalanced(90, 10);
        let set = Resampler::new(5).unwrap().balance(&x, &y, 42).unwrap();
        assert_eq!(set.class_counts(), vec![90, 90]);
        assert_eq!(set.features.nrows(), 180);
        assert_eq!(set.features.ncols(), 3);
        // originals are untouched and come first
        assert_eq!(set.features.slice(ndarray::s![..100, ..]), x);
        assert_eq!(&set.labels[..100], &y[..]);
        // synthetic rows stay on the minority segment
        for row in set.features.rows().into_iter().skip(100) {
            assert!(row[0] >= 5.0 && row[0] <= 6.8 + 1e-12);
            assert_eq!(row[2], 1.0);
        }
    }

    #[test]
    fn test_input_fold_is_unchanged() {
        let (x, y) = imbalanced(20, 4);
        let before = (x.clone(), y.clone());
        Resampler::new(3).unwrap().balance(&x, &y, 1).unwrap();
        assert_eq!((x, y), before);
    }

    #[test]
    fn test_seeded() {
        let (x, y) = imbalanced(30, 5);
        let r = Resampler::new(5).unwrap();
        assert_eq!(r.balance(&x, &y, 9).unwrap(), r.balance(&x, &y, 9).unwrap());
    }

    #[test]
    fn test_too_few_minority_rows() {
        let (x, y) = imbalanced(10, 1);
        match Resampler::new(5).unwrap().balance(&x, &y, 0) {
            Err(PipelineError::Resampling(SmoteError::TooFewSamples { count, .. })) => {
                assert_eq!(count, 1)
            }
            other => panic!("expected TooFewSamples, got {:?}", other),
        }
    }

    #[test]
    fn test_single_class() {
        let (x, y) = imbalanced(10, 0);
        assert!(matches!(
            Resampler::new(5).unwrap().balance(&x, &y, 0),
            Err(PipelineError::Resampling(SmoteError::SingleClass))
        ));
        assert!(Resampler::new(0).is_err());
    }
}
