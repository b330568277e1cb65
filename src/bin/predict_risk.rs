//! Score a single order description against the saved artifact.
//!
//! Run: ./target/release/predict_risk --customer-state SP --seller-state SP \
//!        --category bed_bath_table --price 120 --freight 18.5 --estimated-days 14

use anyhow::Result;
use clap::Parser;
use olist_delivery_risk::{config::PathArgs, models::OrderFeatures, predict::Predictor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Estimate the probability that an order arrives late")]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    #[arg(long)]
    customer_state: Option<String>,

    #[arg(long)]
    seller_state: Option<String>,

    /// Product category name (Portuguese, as in the raw data)
    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    price: f64,

    #[arg(long)]
    freight: f64,

    /// Promised delivery window in days
    #[arg(long)]
    estimated_days: f64,

    /// 0 = Sunday .. 6 = Saturday
    #[arg(long, default_value_t = 1)]
    dow: i32,

    #[arg(long, default_value_t = 1)]
    month: i32,

    #[arg(long, default_value_t = 2018)]
    year: i32,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let cli = Cli::parse();
    let predictor = Predictor::load(&cli.paths.model_path)?;

    let request = OrderFeatures {
        customer_state: cli.customer_state,
        seller_state: cli.seller_state,
        product_category_name: cli.category,
        price: cli.price,
        freight_value: cli.freight,
        estimated_delivery_days: cli.estimated_days,
        purchase_dow: cli.dow,
        purchase_month: cli.month,
        purchase_year: cli.year,
    };

    let prediction = predictor.predict(&request)?;
    println!("Probability late: {:.3}", prediction.probability_late);
    println!("Label:            {}", prediction.label);

    Ok(())
}
