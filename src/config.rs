//! Run configuration. Every value has a default, so a run needs no file.

use crate::error::{PipelineError, Result};
use crate::model::ModelVariant;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Where the identifier, label and coerced numeric columns live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    pub id_column: String,
    pub label_column: String,
    /// Raw label value that maps to class 1.
    pub positive_label: String,
    /// Raw label value expected for class 0; anything else is unrecognised.
    pub negative_label: String,
    /// Columns forced to numeric; cells that do not parse become missing.
    pub numeric_coercions: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            id_column: "customerID".into(),
            label_column: "Churn".into(),
            positive_label: "Yes".into(),
            negative_label: "No".into(),
            numeric_coercions: vec!["TotalCharges".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub schema: SchemaConfig,
    /// Share of each class held out for evaluation.
    pub test_fraction: f64,
    pub split_seed: u64,
    /// Neighbours considered when synthesising minority rows.
    pub k_neighbors: usize,
    /// Treat label values other than the positive/negative pair as fatal.
    pub strict_labels: bool,
    /// Stop at the first failing model variant instead of recording it.
    pub fail_fast: bool,
    pub models: Vec<ModelVariant>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/WA_Fn-UseC_-Telco-Customer-Churn.csv"),
            schema: SchemaConfig::default(),
            test_fraction: 0.2,
            split_seed: 42,
            k_neighbors: 5,
            strict_labels: false,
            fail_fast: false,
            models: ModelVariant::default_registry(),
        }
    }
}

impl PipelineConfig {
    /// Reads a TOML file. Keys left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.k_neighbors == 0 {
            return Err(PipelineError::Config(
                "k_neighbors must be at least 1".into(),
            ));
        }
        if self.models.is_empty() {
            return Err(PipelineError::Config("no model variants configured".into()));
        }
        if self.schema.id_column == self.schema.label_column {
            return Err(PipelineError::Config(
                "id_column and label_column must differ".into(),
            ));
        }
        if self.schema.positive_label == self.schema.negative_label {
            return Err(PipelineError::Config(
                "positive_label and negative_label must differ".into(),
            ));
        }
        for model in &self.models {
            model.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoostedParams, ModelKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.split_seed, 42);
        assert_eq!(config.k_neighbors, 5);
        assert!(!config.strict_labels);
        assert!(!config.fail_fast);
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.schema.positive_label, "Yes");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            input = "other.csv"
            k_neighbors = 3

            [schema]
            label_column = "Exited"

            [[models]]
            name = "Boost"
            kind = "boosted"
            n_estimators = 20
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.input, PathBuf::from("other.csv"));
        assert_eq!(config.k_neighbors, 3);
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.schema.label_column, "Exited");
        assert_eq!(config.schema.id_column, "customerID");
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].seed, 7);
        assert_eq!(
            config.models[0].kind,
            ModelKind::Boosted(BoostedParams {
                n_estimators: 20,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_validation_errors() {
        let bad = [
            PipelineConfig {
                test_fraction: 1.0,
                ..Default::default()
            },
            PipelineConfig {
                k_neighbors: 0,
                ..Default::default()
            },
            PipelineConfig {
                models: vec![],
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
        }
        assert!(PipelineConfig::from_toml("unknown_key = 1").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "split_seed = 9\nfail_fast = true").unwrap();
        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.split_seed, 9);
        assert!(config.fail_fast);

        assert!(PipelineConfig::from_file(Path::new("/no/such/config.toml")).is_err());
    }
}
