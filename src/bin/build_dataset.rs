//! Build the item-level feature dataset from the metrics and raw tables.
//!
//! Run: ./target/release/build_dataset [--db-path PATH] [--dataset-path FILE]

use anyhow::Result;
use clap::Parser;
use olist_delivery_risk::{config::PathArgs, dataset, db};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Rebuild ml_delivery_dataset and export it as CSV")]
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

    let rows = dataset::materialize(&db, &cli.paths.dataset_path).await?;
    let late = rows.iter().filter(|r| r.is_late).count();

    println!("Feature rows: {}", rows.len());
    if !rows.is_empty() {
        println!("  Late share: {:.1}%", late as f64 / rows.len() as f64 * 100.0);
    }
    println!("  Written to: {}", cli.paths.dataset_path.display());

    Ok(())
}
