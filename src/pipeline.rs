//! Orchestration: load, clean, split, then train and evaluate every model
//! variant independently.

use crate::clean::{CleanReport, clean};
use crate::config::PipelineConfig;
use crate::dataset::{Dataset, RawTable, load_table};
use crate::error::Result;
use crate::evaluate::{EvaluationReport, evaluate};
use crate::model::{FittedModel, ModelVariant};
use crate::report::Sink;
use crate::resample::{BalanceSummary, Resampler};
use crate::split::stratified_split;
use crate::transform::{FeatureTransformer, FittedTransform};
use tracing::{info, warn};

/// The stages trained on one fold: transform, balance, classify.
///
/// Only [`TrainingPipeline::fit`] sees the training fold. The fitted result
/// applies the frozen transform and model to any other fold.
#[derive(Debug, Clone)]
pub struct TrainingPipeline<'a> {
    transformer: FeatureTransformer,
    resampler: Resampler,
    model: &'a ModelVariant,
}

#[derive(Debug, Clone)]
pub struct FittedPipeline {
    transform: FittedTransform,
    model: FittedModel,
    balance: BalanceSummary,
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(
        transformer: FeatureTransformer,
        resampler: Resampler,
        model: &'a ModelVariant,
    ) -> Self {
        Self {
            transformer,
            resampler,
            model,
        }
    }

    pub fn fit(&self, train: &Dataset) -> Result<FittedPipeline> {
        let transform = self.transformer.fit(train)?;
        let features = transform.transform(train)?;
        let balanced = self
            .resampler
            .balance(&features, train.labels(), self.model.seed)?;
        let balance = BalanceSummary {
            before: train.class_counts(),
            after: balanced.class_counts(),
        };
        let labels = ndarray::ArrayView1::from(&balanced.labels);
        let model = self.model.fit(balanced.features.view(), labels)?;
        Ok(FittedPipeline {
            transform,
            model,
            balance,
        })
    }
}

impl FittedPipeline {
    pub fn predict(&self, data: &Dataset) -> Result<Vec<usize>> {
        let features = self.transform.transform(data)?;
        Ok(self.model.predict(features.view()).to_vec())
    }

    pub fn balance(&self) -> &BalanceSummary {
        &self.balance
    }

    pub fn n_features(&self) -> usize {
        self.transform.n_features()
    }
}

/// Evaluation of one variant together with what its training saw.
#[derive(Debug, Clone)]
pub struct VariantReport {
    pub evaluation: EvaluationReport,
    pub balance: BalanceSummary,
    pub n_features: usize,
}

#[derive(Debug)]
pub struct VariantOutcome {
    pub name: String,
    pub result: Result<VariantReport>,
}

impl VariantOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub clean: CleanReport,
    pub train_rows: usize,
    pub test_rows: usize,
    /// In registry order.
    pub outcomes: Vec<VariantOutcome>,
}

impl RunSummary {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}

/// Trains one variant on `train` and scores it on `test`.
pub fn run_variant(
    variant: &ModelVariant,
    train: &Dataset,
    test: &Dataset,
    k_neighbors: usize,
) -> Result<VariantReport> {
    let pipeline =
        TrainingPipeline::new(FeatureTransformer, Resampler::new(k_neighbors)?, variant);
    let fitted = pipeline.fit(train)?;
    let predictions = fitted.predict(test)?;
    let evaluation = evaluate(test.labels(), &predictions)?;
    Ok(VariantReport {
        evaluation,
        balance: fitted.balance().clone(),
        n_features: fitted.n_features(),
    })
}

/// Loads the configured input and runs every model variant.
pub fn run(config: &PipelineConfig, sink: &mut dyn Sink) -> Result<RunSummary> {
    config.validate()?;
    let raw = load_table(&config.input)?;
    run_table(&raw, config, sink)
}

/// Runs the pipeline on an already loaded table. `config` is used as given;
/// [`run`] validates it first.
pub fn run_table(
    raw: &RawTable,
    config: &PipelineConfig,
    sink: &mut dyn Sink,
) -> Result<RunSummary> {
    let (dataset, clean_report) = clean(raw, &config.schema, config.strict_labels)?;
    let split = stratified_split(&dataset, config.test_fraction, config.split_seed)?;
    let train = split.train_dataset(&dataset)?;
    let test = split.test_dataset(&dataset)?;

    let mut outcomes = Vec::with_capacity(config.models.len());
    for variant in &config.models {
        info!(model = %variant.name, "training and evaluating");
        let outcome = VariantOutcome {
            name: variant.name.clone(),
            result: run_variant(variant, &train, &test, config.k_neighbors),
        };
        sink.emit(&outcome);
        match outcome.result {
            Ok(report) => {
                info!(
                    model = %outcome.name,
                    accuracy = report.evaluation.accuracy,
                    "variant evaluated"
                );
                outcomes.push(VariantOutcome {
                    name: outcome.name,
                    result: Ok(report),
                });
            }
            Err(e) => {
                warn!(model = %outcome.name, stage = e.stage(), error = %e, "variant failed");
                if config.fail_fast {
                    return Err(e);
                }
                outcomes.push(VariantOutcome {
                    name: outcome.name,
                    result: Err(e),
                });
            }
        }
    }

    Ok(RunSummary {
        clean: clean_report,
        train_rows: train.len(),
        test_rows: test.len(),
        outcomes,
    })
}
