//! Churn prediction pipeline.
//!
//! A customer table is cleaned, split into stratified training and
//! evaluation folds, and each configured classifier is trained on the
//! scaled, one-hot encoded and SMOTE-balanced training fold before being
//! scored on the untouched evaluation fold.

pub mod clean;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod resample;
pub mod split;
pub mod transform;

pub use churn_helpers::{DataPoint, Distance, Float, L2Dist};
pub use clean::{CellIssue, CleanReport, clean};
pub use cli::Args;
pub use config::{PipelineConfig, SchemaConfig};
pub use dataset::{Dataset, RawTable, load_table};
pub use error::{PipelineError, Result};
pub use evaluate::{EvaluationReport, evaluate};
pub use model::{FittedModel, ModelKind, ModelVariant};
pub use pipeline::{FittedPipeline, RunSummary, TrainingPipeline, VariantOutcome, run, run_table};
pub use report::{Sink, StdoutSink, render};
pub use resample::{BalancedTrainingSet, Resampler};
pub use split::{Split, stratified_split};
pub use transform::{FeatureMatrix, FeatureTransformer, FittedTransform};
