use anyhow::Result;
use clap::Parser;
use olist_delivery_risk::{config::PathArgs, db, kpi};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Store status and delivery KPIs.
#[derive(Parser, Debug)]
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

    info!("Connected to SurrealDB at {}", cli.paths.db_path);

    info!("=== Table Counts ===");
    for table in [
        db::CUSTOMERS,
        db::ORDERS,
        db::ORDER_ITEMS,
        db::ORDER_PAYMENTS,
        db::ORDER_REVIEWS,
        db::PRODUCTS,
        db::SELLERS,
        db::ORDER_DELIVERY_METRICS,
        db::ML_DELIVERY_DATASET,
    ] {
        info!("{:<24} {:>10}", table, db::count(&db, table).await?);
    }

    let kpis = kpi::load_kpis(&db).await?;
    info!("=== Delivery KPIs ===");
    info!("Orders with complete delivery data: {}", kpis.n_orders);
    info!("Average delivery days: {:.2}", kpis.avg_delivery_days);
    info!("Late rate: {:.1}%", kpis.late_rate * 100.0);

    if cli.paths.model_path.exists() {
        info!("Model artifact: {}", cli.paths.model_path.display());
    } else {
        info!("No model artifact at {} (run train_model)", cli.paths.model_path.display());
    }

    Ok(())
}
