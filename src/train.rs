//! Offline training: split, fit the pipeline on the training partition,
//! evaluate on the held-out partition.

use anyhow::{ensure, Result};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

use crate::artifact::{ModelArtifact, TrainingSummary, ARTIFACT_FORMAT};
use crate::config::TrainingConfig;
use crate::ml::{stratified_split, Estimator, EvaluationReport, PipelineSpec, Split};
use crate::models::{FeatureRow, OrderFeatures};
use crate::predict::LATE_THRESHOLD;

fn late_rate(labels: &[bool], idx: &[usize]) -> f64 {
    if idx.is_empty() {
        return 0.0;
    }
    idx.iter().filter(|&&i| labels[i]).count() as f64 / idx.len() as f64
}

/// Partition `rows` the way [`train`] does.
pub fn split_rows(rows: &[FeatureRow], config: &TrainingConfig) -> Result<Split> {
    let labels: Vec<bool> = rows.iter().map(|r| r.is_late).collect();
    let groups: Vec<&str> = rows.iter().map(|r| r.order_id.as_str()).collect();
    stratified_split(&labels, &groups, config.split, config.test_fraction, config.seed)
}

/// Fit and evaluate a pipeline. Poor metrics do not fail training; the
/// caller decides whether to keep the artifact.
pub fn train(rows: &[FeatureRow], config: &TrainingConfig) -> Result<ModelArtifact> {
    config.validate()?;
    ensure!(!rows.is_empty(), "feature dataset is empty");

    let labels: Vec<bool> = rows.iter().map(|r| r.is_late).collect();
    let split = split_rows(rows, config)?;
    ensure!(!split.train.is_empty(), "training partition is empty");

    info!(
        "Split {} rows ({:?} level): {} train, {} held out",
        rows.len(),
        config.split,
        split.train.len(),
        split.test.len()
    );

    let features = |idx: &[usize]| -> Vec<OrderFeatures> { idx.iter().map(|&i| rows[i].features()).collect() };
    let pick = |idx: &[usize]| -> Vec<bool> { idx.iter().map(|&i| labels[i]).collect() };

    let train_x = features(&split.train);
    let train_y = pick(&split.train);

    let started = Instant::now();
    let pipeline = PipelineSpec::new(config.forest.clone()).fit(&train_x, &train_y)?;
    info!("Training finished in {:.1}s", started.elapsed().as_secs_f64());
    debug!("Encoded columns: {}", pipeline.preprocessor().feature_names().join(", "));

    let test_x = features(&split.test);
    let test_y = pick(&split.test);
    let scores = pipeline.predict_proba_all(&test_x);
    let evaluation = EvaluationReport::compute(&test_y, &scores, LATE_THRESHOLD);

    match evaluation.roc_auc {
        Some(auc) => info!("Held-out ROC AUC: {:.4}", auc),
        None => info!("Held-out ROC AUC undefined (single class)"),
    }

    let summary = TrainingSummary {
        n_rows: rows.len(),
        n_train: split.train.len(),
        n_test: split.test.len(),
        train_late_rate: late_rate(&labels, &split.train),
        test_late_rate: late_rate(&labels, &split.test),
        n_encoded_features: pipeline.preprocessor().output_width(),
        config: config.clone(),
    };

    Ok(ModelArtifact {
        format: ARTIFACT_FORMAT.to_string(),
        trained_at: Utc::now(),
        summary,
        evaluation,
        pipeline,
    })
}
