use anyhow::{Context, Result, bail};
use churn::{Args, PipelineConfig, StdoutSink, run};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(input) = args.input {
        config.input = input;
    }

    let summary = run(&config, &mut StdoutSink)
        .with_context(|| format!("pipeline failed on {}", config.input.display()))?;

    info!(
        variants = summary.outcomes.len(),
        failed = summary.failures(),
        "run finished"
    );
    if summary.failures() == summary.outcomes.len() {
        bail!("every model variant failed");
    }
    Ok(())
}
