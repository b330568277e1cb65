//! Load the raw Olist CSV exports into the analytical store.
//!
//! Run: ./target/release/ingest [--raw-dir DIR] [--db-path PATH]

use anyhow::Result;
use clap::Parser;
use olist_delivery_risk::{config::PathArgs, db, ingest};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Replace the raw tables with the Olist CSV exports")]
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

    info!("Connecting to SurrealDB at {}", cli.paths.db_path);
    let db = db::connect(&cli.paths.db_path).await?;

    info!("Reading CSV files from {}", cli.paths.raw_dir.display());
    let loads = ingest::ingest_all(&db, &cli.paths.raw_dir).await?;

    let skipped: usize = loads.iter().map(|l| l.skipped).sum();
    info!("Ingestion complete ({} records skipped)", skipped);

    // Sanity check
    let orders = db::count(&db, db::ORDERS).await?;
    println!("Orders in store: {}", orders);

    Ok(())
}
