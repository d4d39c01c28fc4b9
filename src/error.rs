//! Error taxonomy of the pipeline.
//!
//! Load, schema and configuration errors abort a run before any model is
//! trained. Resampling and model-fit errors are scoped to one model variant
//! and end up in that variant's outcome unless `fail_fast` is set.

use smote::SmoteError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The source table could not be read.
    #[error("data load failed for {}{}: {reason}", .path.display(), line_suffix(.line))]
    DataLoad {
        path: PathBuf,
        line: Option<u64>,
        reason: String,
    },

    /// A required column is absent, or a value violates the schema.
    #[error("schema error in {stage}: column `{column}`{}: {reason}", row_suffix(.row))]
    Schema {
        stage: &'static str,
        column: String,
        row: Option<usize>,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("split failed: {0}")]
    Split(String),

    /// A stage received a fold without rows.
    #[error("{stage} received an empty fold")]
    EmptyFold { stage: &'static str },

    #[error("resampling failed on the training fold: {0}")]
    Resampling(#[from] SmoteError),

    #[error("fitting `{model}` failed: {reason}")]
    ModelFit { model: String, reason: String },

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

impl PipelineError {
    /// Name of the stage that raised the error.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::DataLoad { .. } => "load",
            PipelineError::Schema { stage, .. } => *stage,
            PipelineError::Config(_) => "config",
            PipelineError::Split(_) => "split",
            PipelineError::EmptyFold { stage } => *stage,
            PipelineError::Resampling(_) => "resample",
            PipelineError::ModelFit { .. } => "fit",
            PipelineError::Evaluation(_) => "evaluate",
        }
    }
}

fn line_suffix(line: &Option<u64>) -> String {
    line.map(|l| format!(" (line {})", l)).unwrap_or_default()
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|r| format!(" at row {}", r)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let e = PipelineError::Schema {
            stage: "clean",
            column: "Churn".into(),
            row: Some(17),
            reason: "unrecognised label `maybe`".into(),
        };
        assert_eq!(
            e.to_string(),
            "schema error in clean: column `Churn` at row 17: unrecognised label `maybe`"
        );
        assert_eq!(e.stage(), "clean");

        let e = PipelineError::DataLoad {
            path: PathBuf::from("data/churn.csv"),
            line: Some(4),
            reason: "found record with 3 fields".into(),
        };
        assert_eq!(
            e.to_string(),
            "data load failed for data/churn.csv (line 4): found record with 3 fields"
        );
    }

    #[test]
    fn test_resampling_error_converts() {
        let e: PipelineError = SmoteError::SingleClass.into();
        assert_eq!(e.stage(), "resample");
        assert!(e.to_string().starts_with("resampling failed"));
    }
}
