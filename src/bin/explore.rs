//! Quick look at the raw tables.
//!
//! Run: ./target/release/explore [--db-path PATH]

use anyhow::Result;
use clap::Parser;
use olist_delivery_risk::{config::PathArgs, db, explore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Print customer, order status and payment summaries")]
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

    println!("\n{}", "=".repeat(60));
    println!("              OLIST E-COMMERCE EXPLORATION");
    println!("{}\n", "=".repeat(60));

    let report = explore::report(&db).await?;
    print!("{}", report);

    Ok(())
}
