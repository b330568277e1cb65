//! Serialized model artifact: the fitted pipeline plus what was learned
//! about it at training time.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::TrainingConfig;
use crate::error::ArtifactError;
use crate::ml::{EvaluationReport, FittedPipeline};

pub const ARTIFACT_FORMAT: &str = "olist-delivery-risk/1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub train_late_rate: f64,
    pub test_late_rate: f64,
    pub n_encoded_features: usize,
    pub config: TrainingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub trained_at: DateTime<Utc>,
    pub summary: TrainingSummary,
    pub evaluation: EvaluationReport,
    pub pipeline: FittedPipeline,
}

/// Write the artifact, replacing any previous one at `path`.
pub fn save(path: &Path, artifact: &ModelArtifact) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    // Readers must never see a partially written artifact.
    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, artifact).context("encoding model artifact")?;
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("moving artifact into {}", path.display()))?;
    Ok(())
}

pub fn load(path: &Path) -> std::result::Result<ModelArtifact, ArtifactError> {
    // Decoded from a slice so a damaged length prefix fails instead of allocating.
    let bytes = fs::read(path).map_err(|source| ArtifactError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let artifact: ModelArtifact = bincode::deserialize(&bytes).map_err(|e| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if artifact.format != ARTIFACT_FORMAT {
        return Err(ArtifactError::IncompatibleFormat {
            found: artifact.format,
            expected: ARTIFACT_FORMAT.to_string(),
        });
    }

    artifact.pipeline.validate().map_err(|e| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    })?;
    Ok(artifact)
}
