//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Train and compare churn classifiers on a customer table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file (overrides the configured path)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// TOML file with pipeline settings; defaults apply without one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::parse_from(["churn", "--input", "data.csv", "-v"]);
        assert_eq!(args.input, Some(PathBuf::from("data.csv")));
        assert!(args.config.is_none());
        assert!(args.verbose);

        let args = Args::parse_from(["churn", "-c", "run.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("run.toml")));
        assert!(!args.verbose);
    }

    #[test]
    fn test_rejects_unknown_flags() {
        assert!(Args::try_parse_from(["churn", "--seed", "3"]).is_err());
    }
}
