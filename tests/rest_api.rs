//! REST routes driven in-process through the router.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use olist_delivery_risk::api::handlers::create_rest_router;
use olist_delivery_risk::api::RiskService;
use olist_delivery_risk::artifact::{ModelArtifact, TrainingSummary, ARTIFACT_FORMAT};
use olist_delivery_risk::config::TrainingConfig;
use olist_delivery_risk::ml::forest::DecisionTree;
use olist_delivery_risk::ml::{ColumnTransformerSpec, Estimator, EvaluationReport, FittedPipeline, RandomForest};
use olist_delivery_risk::models::{DeliveryMetric, OrderFeatures};
use olist_delivery_risk::predict::{Predictor, LATE_THRESHOLD};
use olist_delivery_risk::db;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn features(state: &str, category: &str) -> OrderFeatures {
    OrderFeatures {
        customer_state: Some(state.into()),
        seller_state: Some("SP".into()),
        product_category_name: Some(category.into()),
        price: 89.9,
        freight_value: 15.3,
        estimated_delivery_days: 21.0,
        purchase_dow: 3,
        purchase_month: 8,
        purchase_year: 2018,
    }
}

/// Artifact whose forest averages the given leaf probabilities.
fn fixed_artifact(leaves: &[f64]) -> ModelArtifact {
    let rows = vec![features("SP", "brinquedos"), features("RJ", "perfumaria")];
    let preprocessor = ColumnTransformerSpec.fit(&rows, &[false, true]).unwrap();
    let trees = leaves.iter().map(|p| DecisionTree::leaf(*p)).collect();
    let model = RandomForest::from_trees(preprocessor.output_width(), trees);
    let pipeline = FittedPipeline::from_parts(preprocessor, model).unwrap();

    ModelArtifact {
        format: ARTIFACT_FORMAT.to_string(),
        trained_at: Utc::now(),
        summary: TrainingSummary {
            n_rows: 2,
            n_train: 2,
            n_test: 0,
            train_late_rate: 0.5,
            test_late_rate: 0.0,
            n_encoded_features: pipeline.preprocessor().output_width(),
            config: TrainingConfig::default(),
        },
        evaluation: EvaluationReport::compute(&[], &[], LATE_THRESHOLD),
        pipeline,
    }
}

async fn service_with_metrics(metrics: &[DeliveryMetric], leaves: &[f64]) -> Arc<RiskService> {
    let db = db::connect_in_memory().await.unwrap();
    db::init_schema(&db).await.unwrap();
    db::replace_table(&db, db::ORDER_DELIVERY_METRICS, metrics).await.unwrap();
    Arc::new(RiskService::with_predictor(db, Predictor::new(fixed_artifact(leaves))))
}

fn metric(order_id: &str, delivery_days: i64, estimated: i64) -> DeliveryMetric {
    DeliveryMetric {
        order_id: order_id.into(),
        customer_id: format!("c_{}", order_id),
        delivery_days,
        estimated_delivery_days: estimated,
        delay_vs_estimate_days: delivery_days - estimated,
        purchase_ts: chrono::NaiveDate::from_ymd_opt(2018, 3, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
    }
}

async fn send(service: Arc<RiskService>, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_rest_router(service).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, body)
}

fn post_predict(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let service = service_with_metrics(&[], &[0.1]).await;
    let (status, body) = send(service, Request::get("/api/v1/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_kpis() {
    let service = service_with_metrics(&[metric("a", 5, 7), metric("b", 10, 7)], &[0.1]).await;
    let (status, body) = send(service, Request::get("/api/v1/kpis").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_orders"], 2);
    assert_eq!(body["avg_delivery_days"], 7.5);
    assert_eq!(body["late_rate"], 0.5);
}

#[tokio::test]
async fn test_predict_labels_late_at_threshold() {
    let service = service_with_metrics(&[], &[1.0, 0.0]).await;
    let request = post_predict(json!({
        "customer_state": "SP",
        "seller_state": "SP",
        "product_category_name": "brinquedos",
        "price": 120.0,
        "freight_value": 18.5,
        "estimated_delivery_days": 14,
        "purchase_dow": 1,
        "purchase_month": 3,
        "purchase_year": 2018
    }));
    let (status, body) = send(service, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["probability_late"], 0.5);
    assert_eq!(body["label"], "LATE");
}

#[tokio::test]
async fn test_predict_with_unseen_and_missing_categories() {
    let service = service_with_metrics(&[], &[0.2]).await;
    let request = post_predict(json!({
        "customer_state": "AC",
        "product_category_name": "nunca_visto",
        "price": 30.0,
        "freight_value": 9.0,
        "estimated_delivery_days": 30,
        "purchase_dow": 6,
        "purchase_month": 12,
        "purchase_year": 2019
    }));
    let (status, body) = send(service, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "ON-TIME");
}

#[tokio::test]
async fn test_predict_rejects_invalid_calendar() {
    let service = service_with_metrics(&[], &[0.2]).await;
    let request = post_predict(json!({
        "price": 30.0,
        "freight_value": 9.0,
        "estimated_delivery_days": 30,
        "purchase_dow": 7,
        "purchase_month": 12,
        "purchase_year": 2019
    }));
    let (status, body) = send(service, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("purchase_dow"));
}

#[tokio::test]
async fn test_predict_without_model_is_unavailable() {
    let db = db::connect_in_memory().await.unwrap();
    let service = Arc::new(RiskService::new(db, "/nonexistent/delivery_risk_model.bin"));
    let request = post_predict(serde_json::to_value(features("SP", "brinquedos")).unwrap());
    let (status, _) = send(service, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_model_summary() {
    let service = service_with_metrics(&[], &[0.2, 0.4, 0.6]).await;
    let (status, body) = send(service, Request::get("/api/v1/model").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_trees"], 3);
    assert_eq!(body["format"], ARTIFACT_FORMAT);
    assert_eq!(body["summary"]["config"]["seed"], 42);
}
