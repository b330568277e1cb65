//! API module for delivery risk
//!
//! Provides both REST and gRPC interfaces to the KPIs and the risk model.

pub mod proto {
    #![allow(clippy::all)]
    #![allow(warnings)]
    include!("olist.v1.rs");
}

pub mod service;
pub mod handlers;
pub mod grpc;

pub use service::RiskService;
