//! Raw table loading and the typed dataset the rest of the pipeline works on.

use crate::error::{PipelineError, Result};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// A headered grid of strings. Headers are trimmed; cells are kept exactly
/// as read from the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a headered CSV file into a [`RawTable`].
pub fn load_table(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).map_err(|e| PipelineError::DataLoad {
        path: path.to_path_buf(),
        line: None,
        reason: e.to_string(),
    })?;
    let table = read_table(file).map_err(|e| match e {
        PipelineError::DataLoad { line, reason, .. } => PipelineError::DataLoad {
            path: path.to_path_buf(),
            line,
            reason,
        },
        other => other,
    })?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers.len(),
        "loaded table"
    );
    Ok(table)
}

/// Reads headered CSV from any reader. Ragged rows are an error.
pub fn read_table<R: Read>(reader: R) -> Result<RawTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(load_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(load_error)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { headers, rows })
}

fn load_error(e: csv::Error) -> PipelineError {
    let line = match e.kind() {
        csv::ErrorKind::UnequalLengths { pos, .. } => pos.as_ref().map(|p| p.line()),
        _ => e.position().map(|p| p.line()),
    };
    PipelineError::DataLoad {
        path: Default::default(),
        line,
        reason: e.to_string(),
    }
}

/// Type of a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// A named, typed feature column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: ColumnKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
}

/// One cleaned row. `values` line up with [`Dataset::fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub values: Vec<Value>,
    pub raw_label: String,
}

/// Records with a parallel vector of binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    fields: Vec<Field>,
    records: Vec<Record>,
    labels: Vec<usize>,
}

impl Dataset {
    /// Builds a dataset, checking that labels and records line up and that
    /// every record matches the field list.
    pub fn new(fields: Vec<Field>, records: Vec<Record>, labels: Vec<usize>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(PipelineError::Schema {
                stage: "dataset",
                column: "<label>".into(),
                row: None,
                reason: format!("{} records but {} labels", records.len(), labels.len()),
            });
        }
        for (row, record) in records.iter().enumerate() {
            if record.values.len() != fields.len() {
                return Err(PipelineError::Schema {
                    stage: "dataset",
                    column: "<record>".into(),
                    row: Some(row),
                    reason: format!(
                        "{} values for {} fields",
                        record.values.len(),
                        fields.len()
                    ),
                });
            }
            for (field, value) in fields.iter().zip(&record.values) {
                let matches = matches!(
                    (field.kind, value),
                    (ColumnKind::Numeric, Value::Numeric(_))
                        | (ColumnKind::Categorical, Value::Categorical(_))
                );
                if !matches {
                    return Err(PipelineError::Schema {
                        stage: "dataset",
                        column: field.name.clone(),
                        row: Some(row),
                        reason: format!("value {:?} does not match {:?}", value, field.kind),
                    });
                }
            }
        }
        Ok(Self {
            fields,
            records,
            labels,
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A new dataset holding the rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Result<Dataset> {
        let mut records = Vec::with_capacity(indices.len());
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            let record = self.records.get(i).ok_or_else(|| {
                PipelineError::Split(format!("index {} out of bounds for {} rows", i, self.len()))
            })?;
            records.push(record.clone());
            labels.push(self.labels[i]);
        }
        Ok(Dataset {
            fields: self.fields.clone(),
            records,
            labels,
        })
    }

    /// Number of rows per label, indexed by label.
    pub fn class_counts(&self) -> Vec<usize> {
        class_counts(&self.labels)
    }
}

/// Counts of each label value; the result has `max(label) + 1` entries.
pub fn class_counts(labels: &[usize]) -> Vec<usize> {
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut counts = vec![0; n_classes];
    for &l in labels {
        counts[l] += 1;
    }
    counts
}
