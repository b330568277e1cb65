//! Materialize per-order delivery metrics from the orders table.
//!
//! Run: ./target/release/derive_metrics [--db-path PATH]

use anyhow::Result;
use clap::Parser;
use olist_delivery_risk::{config::PathArgs, db, kpi::Kpis, metrics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Rebuild the order_delivery_metrics table")]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let cli = Cli::parse();
    let db = db::connect(&cli.paths.db_path).await?;
    db::init_schema(&db).await?;

    let metrics = metrics::materialize(&db).await?;
    let kpis = Kpis::from_metrics(&metrics);

    println!("Delivery metrics: {} orders", kpis.n_orders);
    println!("  Avg delivery days: {:.2}", kpis.avg_delivery_days);
    println!("  Late rate:         {:.1}%", kpis.late_rate * 100.0);

    Ok(())
}
