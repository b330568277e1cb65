//! Paths and training settings shared by the binaries.

use anyhow::{ensure, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ml::{ForestParams, SplitStrategy};

/// File locations, overridable by flag or environment.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Path to the SurrealDB analytical store
    #[arg(long, env = "OLIST_DB_PATH", default_value = "data/olist.db")]
    pub db_path: String,

    /// Directory holding the raw Olist CSV exports
    #[arg(long, env = "OLIST_RAW_DIR", default_value = "data/raw")]
    pub raw_dir: PathBuf,

    /// Feature dataset written by build_dataset and read by train_model
    #[arg(long, env = "OLIST_DATASET_PATH", default_value = "data/processed/ml_delivery_dataset.csv")]
    pub dataset_path: PathBuf,

    /// Serialized model artifact
    #[arg(long, env = "OLIST_MODEL_PATH", default_value = "data/processed/delivery_risk_model.bin")]
    pub model_path: PathBuf,
}

/// How the trainer partitions and fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub split: SplitStrategy,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            split: SplitStrategy::Row,
            forest: ForestParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Load from a JSON file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading training config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing training config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..1.0).contains(&self.test_fraction),
            "test_fraction must be in [0, 1), got {}",
            self.test_fraction
        );
        ensure!(self.forest.n_trees > 0, "forest.n_trees must be at least 1");
        ensure!(self.forest.min_samples_split >= 2, "forest.min_samples_split must be at least 2");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::MaxFeatures;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.split, SplitStrategy::Row);
        assert_eq!(config.forest.n_trees, 200);
        assert_eq!(config.forest.max_depth, None);
        assert!(config.forest.parallel);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"split": "order", "forest": {{"n_trees": 50, "max_features": {{"count": 4}}}}}}"#).unwrap();

        let config = TrainingConfig::from_file(file.path()).unwrap();
        assert_eq!(config.split, SplitStrategy::Order);
        assert_eq!(config.forest.n_trees, 50);
        assert_eq!(config.forest.max_features, MaxFeatures::Count(4));
        assert_eq!(config.forest.seed, 42);
        assert_eq!(config.test_fraction, 0.2);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"test_fraction": 1.0}}"#).unwrap();
        assert!(TrainingConfig::from_file(file.path()).is_err());
    }
}
