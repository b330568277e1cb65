//! Shared business logic for the delivery-risk API
//!
//! This service layer is used by both REST and gRPC handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::artifact::TrainingSummary;
use crate::db::DbConn;
use crate::error::{ArtifactError, ServiceError};
use crate::kpi::{self, Kpis};
use crate::ml::EvaluationReport;
use crate::predict::{Prediction, PredictionRequest, Predictor};

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub format: String,
    pub trained_at: DateTime<Utc>,
    pub n_trees: usize,
    pub summary: TrainingSummary,
    pub evaluation: EvaluationReport,
}

pub struct RiskService {
    db: DbConn,
    model_path: PathBuf,
    predictor: Arc<RwLock<Option<Predictor>>>,
}

impl RiskService {
    pub fn new(db: DbConn, model_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            model_path: model_path.into(),
            predictor: Arc::new(RwLock::new(None)),
        }
    }

    /// Service with an already loaded predictor; the artifact path is never read.
    pub fn with_predictor(db: DbConn, predictor: Predictor) -> Self {
        Self {
            db,
            model_path: PathBuf::new(),
            predictor: Arc::new(RwLock::new(Some(predictor))),
        }
    }

    /// Load the artifact if it is not loaded yet. Once loaded, it is never
    /// replaced for the lifetime of the service.
    pub async fn predictor(&self) -> Result<Predictor, ArtifactError> {
        // Check cache first
        {
            let cache = self.predictor.read().await;
            if let Some(predictor) = cache.as_ref() {
                return Ok(predictor.clone());
            }
        }

        let mut cache = self.predictor.write().await;
        if let Some(predictor) = cache.as_ref() {
            return Ok(predictor.clone());
        }
        let predictor = Predictor::load(&self.model_path)?;
        *cache = Some(predictor.clone());
        Ok(predictor)
    }

    /// Fail fast at startup when the artifact cannot be brought into service.
    pub async fn warm_up(&self) -> Result<(), ArtifactError> {
        let predictor = self.predictor().await?;
        info!(
            "Model ready: {} encoded features, held-out accuracy {:.3}",
            predictor.artifact().summary.n_encoded_features,
            predictor.artifact().evaluation.accuracy
        );
        Ok(())
    }

    pub async fn get_kpis(&self) -> Result<Kpis, ServiceError> {
        Ok(kpi::load_kpis(&self.db).await?)
    }

    pub async fn predict(&self, request: &PredictionRequest) -> Result<Prediction, ServiceError> {
        let predictor = self.predictor().await?;
        Ok(predictor.predict(request)?)
    }

    pub async fn model_summary(&self) -> Result<ModelSummary, ServiceError> {
        let predictor = self.predictor().await?;
        let artifact = predictor.artifact();
        Ok(ModelSummary {
            format: artifact.format.clone(),
            trained_at: artifact.trained_at,
            n_trees: artifact.pipeline.model().trees().len(),
            summary: artifact.summary.clone(),
            evaluation: artifact.evaluation.clone(),
        })
    }
}
