//! Turns a raw string table into a typed [`Dataset`].
//!
//! Rows with a missing or unparsable feature cell are dropped whole; no
//! imputation takes place. The label is 1 iff the raw value equals the
//! configured positive label exactly.

use crate::config::SchemaConfig;
use crate::dataset::{ColumnKind, Dataset, Field, RawTable, Record, Value};
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Why a cell made its row unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    Unparsable,
}

/// A cell that caused its row to be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIssue {
    /// Row index in the raw table (0-based, header excluded).
    pub row: usize,
    pub column: String,
    pub raw: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    pub rows_loaded: usize,
    pub rows_kept: usize,
    pub issues: Vec<CellIssue>,
    /// Kept rows whose label was neither the positive nor the negative value.
    pub unrecognised_labels: usize,
}

impl CleanReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_loaded - self.rows_kept
    }

    /// Number of issues per column, sorted by column name.
    pub fn issues_by_column(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.column.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Binary label of a raw value: strict string equality with `positive`.
pub fn binarize_label(raw: &str, positive: &str) -> usize {
    usize::from(raw == positive)
}

/// Empty or whitespace-only cells count as missing.
fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn required_column(raw: &RawTable, name: &str) -> Result<usize> {
    raw.column_index(name).ok_or_else(|| PipelineError::Schema {
        stage: "clean",
        column: name.to_string(),
        row: None,
        reason: "column not found".into(),
    })
}

/// A column is numeric when it is coerced, or when every present cell
/// parses as a finite float.
fn infer_kind(raw: &RawTable, column: usize, coerced: bool) -> ColumnKind {
    if coerced {
        return ColumnKind::Numeric;
    }
    let mut present = raw
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(String::as_str)
        .filter(|cell| !is_blank(cell))
        .peekable();
    if present.peek().is_none() {
        return ColumnKind::Categorical;
    }
    if present.all(|cell| parse_number(cell).is_some()) {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

pub fn clean(
    raw: &RawTable,
    schema: &SchemaConfig,
    strict_labels: bool,
) -> Result<(Dataset, CleanReport)> {
    let id_col = required_column(raw, &schema.id_column)?;
    let label_col = required_column(raw, &schema.label_column)?;
    for name in &schema.numeric_coercions {
        required_column(raw, name)?;
    }

    let feature_cols: Vec<usize> = (0..raw.headers.len())
        .filter(|&c| c != id_col && c != label_col)
        .collect();
    let fields: Vec<Field> = feature_cols
        .iter()
        .map(|&c| {
            let name = &raw.headers[c];
            let coerced = schema.numeric_coercions.contains(name);
            Field::new(name.clone(), infer_kind(raw, c, coerced))
        })
        .collect();
    debug!(
        numeric = fields.iter().filter(|f| f.kind == ColumnKind::Numeric).count(),
        categorical = fields.iter().filter(|f| f.kind == ColumnKind::Categorical).count(),
        "column types inferred"
    );

    let mut report = CleanReport {
        rows_loaded: raw.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(raw.len());
    let mut labels = Vec::with_capacity(raw.len());

    for (row, cells) in raw.rows.iter().enumerate() {
        if cells.len() != raw.headers.len() {
            return Err(PipelineError::Schema {
                stage: "clean",
                column: "<row>".into(),
                row: Some(row),
                reason: format!("{} cells for {} columns", cells.len(), raw.headers.len()),
            });
        }
        let mut issues = Vec::new();
        for &c in [id_col, label_col].iter() {
            if is_blank(&cells[c]) {
                issues.push(CellIssue {
                    row,
                    column: raw.headers[c].clone(),
                    raw: cells[c].clone(),
                    kind: IssueKind::Missing,
                });
            }
        }

        let mut values = Vec::with_capacity(fields.len());
        for (field, &c) in fields.iter().zip(&feature_cols) {
            let cell = &cells[c];
            if is_blank(cell) {
                issues.push(CellIssue {
                    row,
                    column: field.name.clone(),
                    raw: cell.clone(),
                    kind: IssueKind::Missing,
                });
                continue;
            }
            match field.kind {
                ColumnKind::Numeric => match parse_number(cell) {
                    Some(v) => values.push(Value::Numeric(v)),
                    None => issues.push(CellIssue {
                        row,
                        column: field.name.clone(),
                        raw: cell.clone(),
                        kind: IssueKind::Unparsable,
                    }),
                },
                ColumnKind::Categorical => values.push(Value::Categorical(cell.clone())),
            }
        }

        if !issues.is_empty() {
            report.issues.extend(issues);
            continue;
        }

        let raw_label = &cells[label_col];
        if *raw_label != schema.positive_label && *raw_label != schema.negative_label {
            if strict_labels {
                return Err(PipelineError::Schema {
                    stage: "clean",
                    column: schema.label_column.clone(),
                    row: Some(row),
                    reason: format!("unrecognised label `{}`", raw_label),
                });
            }
            report.unrecognised_labels += 1;
        }

        labels.push(binarize_label(raw_label, &schema.positive_label));
        records.push(Record {
            id: cells[id_col].clone(),
            values,
            raw_label: raw_label.clone(),
        });
    }

    report.rows_kept = records.len();
    info!(
        loaded = report.rows_loaded,
        kept = report.rows_kept,
        dropped = report.rows_dropped(),
        "cleaned table"
    );
    for (column, count) in report.issues_by_column() {
        debug!(column, count, "cells missing or unparsable");
    }
    if report.unrecognised_labels > 0 {
        warn!(
            count = report.unrecognised_labels,
            positive = %schema.positive_label,
            "label values other than the positive/negative pair were treated as negative"
        );
    }

    let dataset = Dataset::new(fields, records, labels)?;
    Ok((dataset, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::read_table;

    fn schema() -> SchemaConfig {
        SchemaConfig::default()
    }

    fn table(rows: &[[&str; 5]]) -> RawTable {
        RawTable::new(
            ["customerID", "gender", "tenure", "TotalCharges", "Churn"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_unparsable_monetary_rows_dropped() {
        let mut rows = Vec::new();
        for i in 0..10 {
            let charges = match i {
                3 => " ".to_string(),
                7 => "n/a".to_string(),
                _ => format!("{}.5", i * 10),
            };
            rows.push([
                format!("id{}", i),
                "Female".to_string(),
                i.to_string(),
                charges,
                "No".to_string(),
            ]);
        }
        let refs: Vec<[&str; 5]> = rows
            .iter()
            .map(|r| [&*r[0], &*r[1], &*r[2], &*r[3], &*r[4]])
            .collect();
        let (data, report) = clean(&table(&refs), &schema(), false).unwrap();

        assert_eq!(data.len(), 8);
        assert_eq!(report.rows_dropped(), 2);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0].row, 3);
        assert_eq!(report.issues[0].kind, IssueKind::Missing);
        assert_eq!(report.issues[0].raw, " ");
        assert_eq!(report.issues[1].raw, "n/a");
        assert_eq!(report.issues[1].kind, IssueKind::Unparsable);
        assert!(data.records().iter().all(|r| r.id != "id3" && r.id != "id7"));
    }

    #[test]
    fn test_strict_equality_label_rule() {
        let raw = table(&[
            ["a", "Male", "1", "1.0", "Yes"],
            ["b", "Male", "1", "1.0", "No"],
            ["c", "Male", "1", "1.0", "yes"],
            ["d", "Male", "1", "1.0", "N/A"],
        ]);
        let (data, report) = clean(&raw, &schema(), false).unwrap();
        assert_eq!(data.labels(), &[1, 0, 0, 0]);
        assert_eq!(report.unrecognised_labels, 2);
        assert_eq!(data.records()[2].raw_label, "yes");
    }

    #[test]
    fn test_padded_label_is_not_positive() {
        let csv = "customerID,TotalCharges,Churn\na,1, Yes\nb,2,Yes\nc, 3 ,No\n";
        let raw = read_table(csv.as_bytes()).unwrap();
        let (data, report) = clean(&raw, &schema(), false).unwrap();
        assert_eq!(data.labels(), &[0, 1, 0]);
        assert_eq!(report.unrecognised_labels, 1);
        assert_eq!(data.records()[0].raw_label, " Yes");
        assert_eq!(data.records()[2].values[0], Value::Numeric(3.0));
    }

    #[test]
    fn test_strict_labels_reject_unknown_values() {
        let raw = table(&[
            ["a", "Male", "1", "1.0", "Yes"],
            ["b", "Male", "1", "1.0", "maybe"],
        ]);
        match clean(&raw, &schema(), true) {
            Err(PipelineError::Schema { column, row, .. }) => {
                assert_eq!(column, "Churn");
                assert_eq!(row, Some(1));
            }
            other => panic!("expected SchemaError, got {:?}", other),
        }
    }

    #[test]
    fn test_column_types() {
        let raw = table(&[
            ["a", "Male", "1", "29.85", "No"],
            ["b", "Female", "34", "1889.5", "Yes"],
        ]);
        let (data, _) = clean(&raw, &schema(), false).unwrap();
        let kinds: Vec<(&str, ColumnKind)> = data
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("gender", ColumnKind::Categorical),
                ("tenure", ColumnKind::Numeric),
                ("TotalCharges", ColumnKind::Numeric),
            ]
        );
        assert_eq!(data.records()[1].values[1], Value::Numeric(34.0));
    }

    #[test]
    fn test_missing_categorical_or_id_drops_row() {
        let raw = table(&[
            ["a", "", "1", "1.0", "No"],
            ["", "Male", "1", "1.0", "No"],
            ["c", "Male", "1", "1.0", ""],
            ["d", "Male", "1", "1.0", "No"],
        ]);
        let (data, report) = clean(&raw, &schema(), false).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(report.rows_kept, 1);
        assert_eq!(report.issues_by_column().get("gender"), Some(&1));
    }

    #[test]
    fn test_missing_columns_are_schema_errors() {
        let raw = table(&[["a", "Male", "1", "1.0", "No"]]);
        let mut s = schema();
        s.label_column = "Exited".into();
        assert!(matches!(
            clean(&raw, &s, false),
            Err(PipelineError::Schema { stage: "clean", .. })
        ));

        let mut s = schema();
        s.numeric_coercions = vec!["MonthlyCharges".into()];
        assert!(clean(&raw, &s, false).is_err());
    }

    #[test]
    fn test_binarize_label() {
        assert_eq!(binarize_label("Yes", "Yes"), 1);
        assert_eq!(binarize_label("YES", "Yes"), 0);
        assert_eq!(binarize_label("", "Yes"), 0);
    }
}
