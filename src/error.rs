//! Errors surfaced at the serving boundary.

use std::path::PathBuf;
use thiserror::Error;

/// The model artifact could not be brought into service.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("model artifact format '{found}' is not supported (expected '{expected}')")]
    IncompatibleFormat { found: String, expected: String },
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("invalid prediction request: {0}")]
    InvalidRequest(String),
}

impl PredictError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}

/// Failure of a request handled by the serving layer, shared by REST and gRPC.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    ModelUnavailable(#[from] ArtifactError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("store query failed: {0:#}")]
    Store(#[from] anyhow::Error),
}
