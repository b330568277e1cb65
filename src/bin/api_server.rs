//! Combined REST + gRPC API Server for delivery risk
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options:
//!   --port PORT         Port to listen on (default: 8080)
//!   --db-path PATH      Path to SurrealDB database (default: data/olist.db)
//!   --model-path FILE   Trained model artifact
//!   --rest-only         Only serve REST endpoints
//!   --grpc-only         Only serve gRPC endpoints
//!
//! REST endpoints:
//!   GET  /api/v1/health    - Health check
//!   GET  /api/v1/kpis      - Delivery KPIs
//!   POST /api/v1/predict   - Late-delivery risk for one order
//!   GET  /api/v1/model     - Training summary of the loaded model
//!
//! gRPC service: olist.v1.DeliveryRiskService

use anyhow::{anyhow, Result};
use clap::Parser;
use olist_delivery_risk::api::{
    grpc::GrpcService,
    handlers::create_rest_router,
    proto::delivery_risk_service_server::DeliveryRiskServiceServer,
    RiskService,
};
use olist_delivery_risk::{config::PathArgs, db};
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server as TonicServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Serve delivery KPIs and late-delivery risk over REST and gRPC")]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    /// Port to listen on; gRPC uses port+1 when both are served
    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[arg(long, conflicts_with = "grpc_only")]
    rest_only: bool,

    #[arg(long)]
    grpc_only: bool,
}

/// gRPC shares `port` when served alone and takes the next port otherwise.
fn resolve_grpc_port(port: u16, grpc_only: bool) -> Result<u16> {
    if grpc_only {
        return Ok(port);
    }
    port.checked_add(1)
        .ok_or_else(|| anyhow!("--port {} leaves no room for the gRPC listener on port+1", port))
}

fn print_banner(port: u16, grpc_port: u16, rest_only: bool, grpc_only: bool) {
    println!("============================================================");
    println!("         OLIST DELIVERY RISK API SERVER");
    println!("============================================================");
    println!();
    println!("  Port:     {}", port);
    if !grpc_only {
        println!("  REST:     http://localhost:{}/api/v1/", port);
    }
    if !rest_only {
        println!("  gRPC:     grpc://localhost:{}", grpc_port);
    }
    println!();
    if !grpc_only {
        println!("REST Endpoints:");
        println!("  GET  /api/v1/health     Health check");
        println!("  GET  /api/v1/kpis       Delivery KPIs");
        println!("  POST /api/v1/predict    Late-delivery risk");
        println!("  GET  /api/v1/model      Model summary");
        println!();
    }
    if !rest_only {
        println!("gRPC Service: olist.v1.DeliveryRiskService");
        println!();
    }
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let cli = Cli::parse();
    let port = cli.port;
    let grpc_port = if cli.rest_only { port } else { resolve_grpc_port(port, cli.grpc_only)? };

    let db = db::connect(&cli.paths.db_path).await?;
    let service = Arc::new(RiskService::new(db, cli.paths.model_path.clone()));
    service.warm_up().await?;

    print_banner(port, grpc_port, cli.rest_only, cli.grpc_only);

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    if cli.grpc_only {
        let grpc_service = GrpcService::new(service);
        tracing::info!("Starting gRPC-only server on {}", addr);

        TonicServer::builder()
            .add_service(DeliveryRiskServiceServer::new(grpc_service))
            .serve(addr)
            .await?;
    } else if cli.rest_only {
        let app = create_rest_router(service);
        tracing::info!("Starting REST-only server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
    } else {
        let grpc_addr: SocketAddr = format!("0.0.0.0:{}", grpc_port).parse()?;

        let rest_service = service.clone();
        let grpc_service = GrpcService::new(service);

        let grpc_handle = tokio::spawn(async move {
            tracing::info!("Starting gRPC server on {}", grpc_addr);
            TonicServer::builder()
                .add_service(DeliveryRiskServiceServer::new(grpc_service))
                .serve(grpc_addr)
                .await
        });

        let app = create_rest_router(rest_service);
        tracing::info!("Starting REST server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let rest_handle = tokio::spawn(async move {
            axum::serve(listener, app).await
        });

        // Wait for either to finish (or error)
        tokio::select! {
            result = grpc_handle => {
                match result {
                    Ok(Err(e)) => tracing::error!("gRPC server error: {}", e),
                    Err(e) => tracing::error!("gRPC server task failed: {}", e),
                    Ok(Ok(())) => {}
                }
            }
            result = rest_handle => {
                match result {
                    Ok(Err(e)) => tracing::error!("REST server error: {}", e),
                    Err(e) => tracing::error!("REST server task failed: {}", e),
                    Ok(Ok(())) => {}
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_takes_next_port_in_combined_mode() {
        assert_eq!(resolve_grpc_port(8080, false).unwrap(), 8081);
        assert_eq!(resolve_grpc_port(8080, true).unwrap(), 8080);
    }

    #[test]
    fn test_highest_port_has_no_room_for_grpc() {
        let err = resolve_grpc_port(u16::MAX, false).unwrap_err();
        assert!(err.to_string().contains("65535"));
        assert_eq!(resolve_grpc_port(u16::MAX, true).unwrap(), u16::MAX);
    }
}
