//! gRPC service implementation for delivery risk
//!
//! Implements the DeliveryRiskService gRPC service using the shared service layer.

use std::sync::Arc;
use tonic::{Request, Response, Status};

use super::proto::delivery_risk_service_server::DeliveryRiskService;
use super::proto::*;
use super::service::RiskService;
use crate::error::{ArtifactError, ServiceError};
use crate::models::OrderFeatures;

pub struct GrpcService {
    service: Arc<RiskService>,
}

impl GrpcService {
    pub fn new(service: Arc<RiskService>) -> Self {
        Self { service }
    }
}

fn to_status(e: ServiceError) -> Status {
    match &e {
        ServiceError::Predict(_) => Status::invalid_argument(e.to_string()),
        ServiceError::ModelUnavailable(ArtifactError::Unavailable { .. }) => Status::unavailable(e.to_string()),
        _ => Status::internal(e.to_string()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn to_features(req: PredictRiskRequest) -> OrderFeatures {
    OrderFeatures {
        customer_state: non_empty(req.customer_state),
        seller_state: non_empty(req.seller_state),
        product_category_name: non_empty(req.product_category_name),
        price: req.price,
        freight_value: req.freight_value,
        estimated_delivery_days: req.estimated_delivery_days,
        purchase_dow: req.purchase_dow,
        purchase_month: req.purchase_month,
        purchase_year: req.purchase_year,
    }
}

#[tonic::async_trait]
impl DeliveryRiskService for GrpcService {
    async fn get_kpis(
        &self,
        _request: Request<GetKpisRequest>,
    ) -> Result<Response<GetKpisResponse>, Status> {
        match self.service.get_kpis().await {
            Ok(kpis) => Ok(Response::new(GetKpisResponse {
                n_orders: kpis.n_orders,
                avg_delivery_days: kpis.avg_delivery_days,
                late_rate: kpis.late_rate,
            })),
            Err(e) => Err(to_status(e)),
        }
    }

    async fn predict_risk(
        &self,
        request: Request<PredictRiskRequest>,
    ) -> Result<Response<PredictRiskResponse>, Status> {
        let features = to_features(request.into_inner());

        match self.service.predict(&features).await {
            Ok(prediction) => Ok(Response::new(PredictRiskResponse {
                probability_late: prediction.probability_late,
                label: prediction.label.to_string(),
            })),
            Err(e) => Err(to_status(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::predict::tests::constant_artifact;
    use crate::predict::Predictor;

    fn grpc_request() -> PredictRiskRequest {
        PredictRiskRequest {
            customer_state: Some("RJ".into()),
            seller_state: Some(String::new()),
            product_category_name: None,
            price: 50.0,
            freight_value: 10.0,
            estimated_delivery_days: 12.0,
            purchase_dow: 0,
            purchase_month: 11,
            purchase_year: 2017,
        }
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let features = to_features(grpc_request());
        assert_eq!(features.customer_state.as_deref(), Some("RJ"));
        assert_eq!(features.seller_state, None);
    }

    #[tokio::test]
    async fn test_predict_risk() {
        let db = db::connect_in_memory().await.unwrap();
        let service = RiskService::with_predictor(db, Predictor::new(constant_artifact(&[0.7])));
        let grpc = GrpcService::new(Arc::new(service));

        let response = grpc.predict_risk(Request::new(grpc_request())).await.unwrap().into_inner();
        assert_eq!(response.label, "LATE");

        let mut bad = grpc_request();
        bad.purchase_dow = 9;
        let status = grpc.predict_risk(Request::new(bad)).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_predict_without_model_is_unavailable() {
        let db = db::connect_in_memory().await.unwrap();
        let grpc = GrpcService::new(Arc::new(RiskService::new(db, "/nonexistent/model.bin")));
        let status = grpc.predict_risk(Request::new(grpc_request())).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }
}
