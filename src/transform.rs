//! Standard scaling of numeric columns and one-hot encoding of categorical
//! ones, learned from the training fold only.

use crate::dataset::{ColumnKind, Dataset, Field, Value};
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use std::collections::BTreeSet;
use tracing::debug;

/// Dense numeric rows produced by a [`FittedTransform`].
pub type FeatureMatrix = Array2<f64>;

/// Column names and types of the fold a transform was fitted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    fields: Vec<Field>,
}

impl FeatureSpec {
    pub fn infer(train: &Dataset) -> Self {
        Self {
            fields: train.fields().to_vec(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fails with the first column that differs from `fields`.
    fn check(&self, fields: &[Field]) -> Result<()> {
        if let Some(position) = self
            .fields
            .iter()
            .zip(fields)
            .position(|(expected, found)| expected != found)
        {
            return Err(PipelineError::Schema {
                stage: "transform",
                column: fields[position].name.clone(),
                row: None,
                reason: format!(
                    "expected `{}` ({:?}) at position {}",
                    self.fields[position].name, self.fields[position].kind, position
                ),
            });
        }
        if self.fields.len() != fields.len() {
            return Err(PipelineError::Schema {
                stage: "transform",
                column: "<columns>".into(),
                row: None,
                reason: format!(
                    "fitted on {} columns, got {}",
                    self.fields.len(),
                    fields.len()
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ColumnTransform {
    Scale { mean: f64, std: f64 },
    OneHot { categories: Vec<String> },
}

impl ColumnTransform {
    fn width(&self) -> usize {
        match self {
            ColumnTransform::Scale { .. } => 1,
            ColumnTransform::OneHot { categories } => categories.len(),
        }
    }
}

/// Learns per-column statistics from a training fold.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureTransformer;

/// Frozen statistics; apply with [`FittedTransform::transform`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedTransform {
    spec: FeatureSpec,
    /// Numeric columns first, then categorical, as `(field index, transform)`.
    columns: Vec<(usize, ColumnTransform)>,
    n_features: usize,
}

impl FeatureTransformer {
    pub fn fit(&self, train: &Dataset) -> Result<FittedTransform> {
        if train.is_empty() {
            return Err(PipelineError::EmptyFold { stage: "transform" });
        }
        let spec = FeatureSpec::infer(train);
        let n = train.len() as f64;

        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for (j, field) in spec.fields().iter().enumerate() {
            match field.kind {
                ColumnKind::Numeric => {
                    let values: Vec<f64> = train
                        .records()
                        .iter()
                        .filter_map(|r| match &r.values[j] {
                            Value::Numeric(v) => Some(*v),
                            Value::Categorical(_) => None,
                        })
                        .collect();
                    let mean = values.iter().sum::<f64>() / n;
                    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                    let mut std = var.sqrt();
                    if std <= 10.0 * f64::EPSILON * mean.abs().max(1.0) {
                        debug!(column = %field.name, "zero variance, centering only");
                        std = 1.0;
                    }
                    numeric.push((j, ColumnTransform::Scale { mean, std }));
                }
                ColumnKind::Categorical => {
                    let categories: BTreeSet<&str> = train
                        .records()
                        .iter()
                        .filter_map(|r| match &r.values[j] {
                            Value::Categorical(c) => Some(c.as_str()),
                            Value::Numeric(_) => None,
                        })
                        .collect();
                    categorical.push((
                        j,
                        ColumnTransform::OneHot {
                            categories: categories.into_iter().map(str::to_string).collect(),
                        },
                    ));
                }
            }
        }

        let mut columns = numeric;
        columns.extend(categorical);
        let n_features = columns.iter().map(|(_, t)| t.width()).sum();
        debug!(columns = columns.len(), features = n_features, "fitted transform");
        Ok(FittedTransform {
            spec,
            columns,
            n_features,
        })
    }
}

impl FittedTransform {
    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Output column names: numeric names as-is, then `column=category`.
    pub fn feature_names(&self) -> Vec<String> {
        let fields = self.spec.fields();
        let mut names = Vec::with_capacity(self.n_features);
        for (j, transform) in &self.columns {
            match transform {
                ColumnTransform::Scale { .. } => names.push(fields[*j].name.clone()),
                ColumnTransform::OneHot { categories } => names.extend(
                    categories
                        .iter()
                        .map(|c| format!("{}={}", fields[*j].name, c)),
                ),
            }
        }
        names
    }

    /// Maps every record of `data` to a row of the feature matrix. Categories
    /// not seen during fit encode as all zeros.
    pub fn transform(&self, data: &Dataset) -> Result<FeatureMatrix> {
        self.spec.check(data.fields())?;
        let mut out = Array2::zeros((data.len(), self.n_features));
        for (i, record) in data.records().iter().enumerate() {
            let mut offset = 0;
            for (j, transform) in &self.columns {
                match (transform, &record.values[*j]) {
                    (ColumnTransform::Scale { mean, std }, Value::Numeric(v)) => {
                        out[[i, offset]] = (v - mean) / std;
                    }
                    (ColumnTransform::OneHot { categories }, Value::Categorical(c)) => {
                        if let Ok(k) = categories.binary_search(c) {
                            out[[i, offset + k]] = 1.0;
                        }
                    }
                    (_, value) => {
                        return Err(PipelineError::Schema {
                            stage: "transform",
                            column: self.spec.fields()[*j].name.clone(),
                            row: Some(i),
                            reason: format!("unexpected value {:?}", value),
                        });
                    }
                }
                offset += transform.width();
            }
        }
        Ok(out)
    }
}
