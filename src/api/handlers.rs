//! REST API handlers for the delivery-risk service
//!
//! These handlers use the shared RiskService.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::service::{ModelSummary, RiskService};
use crate::error::{ArtifactError, PredictError, ServiceError};
use crate::kpi::Kpis;
use crate::predict::{Prediction, PredictionRequest};

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type AppState = Arc<RiskService>;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::Predict(PredictError::InvalidRequest(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::ModelUnavailable(ArtifactError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::ModelUnavailable(_) | ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("request failed: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string() }))
}

/// GET /api/v1/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/v1/kpis
pub async fn get_kpis(State(service): State<AppState>) -> Result<Json<Kpis>, ApiError> {
    service.get_kpis().await.map(Json).map_err(error_response)
}

/// POST /api/v1/predict
pub async fn predict(
    State(service): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<Prediction>, ApiError> {
    service.predict(&request).await.map(Json).map_err(error_response)
}

/// GET /api/v1/model
pub async fn get_model(State(service): State<AppState>) -> Result<Json<ModelSummary>, ApiError> {
    service.model_summary().await.map(Json).map_err(error_response)
}

pub fn create_rest_router(service: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/kpis", get(get_kpis))
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/model", get(get_model))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
