//! Train the delivery-risk pipeline and save the artifact.
//!
//! Run: ./target/release/train_model [--config FILE] [--dataset-path FILE] [--model-path FILE]

use anyhow::Result;
use clap::Parser;
use olist_delivery_risk::{artifact, config::{PathArgs, TrainingConfig}, dataset, train};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Fit the preprocessing + random forest pipeline")]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    /// JSON training config; absent keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of trees
    #[arg(long)]
    n_trees: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(n) = cli.n_trees {
        config.forest.n_trees = n;
    }

    info!("Reading dataset from {}", cli.paths.dataset_path.display());
    let rows = dataset::read_csv(&cli.paths.dataset_path)?;

    let model = train::train(&rows, &config)?;

    println!("{}", model.evaluation);

    artifact::save(&cli.paths.model_path, &model)?;
    info!("Saved model artifact to {}", cli.paths.model_path.display());

    Ok(())
}
