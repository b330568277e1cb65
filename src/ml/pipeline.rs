//! Preprocessing + classifier fitted together and frozen as one object.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::forest::{ForestParams, RandomForest};
use super::preprocess::{ColumnTransformer, ColumnTransformerSpec};
use super::Estimator;
use crate::models::OrderFeatures;

/// Unfitted pipeline: each stage is fitted on the output of the previous one.
#[derive(Debug, Clone, Default)]
pub struct PipelineSpec {
    pub preprocessor: ColumnTransformerSpec,
    pub model: ForestParams,
}

impl PipelineSpec {
    pub const STAGES: [&'static str; 2] = ["preprocessor", "model"];

    pub fn new(model: ForestParams) -> Self {
        Self { preprocessor: ColumnTransformerSpec, model }
    }
}

impl Estimator<OrderFeatures> for PipelineSpec {
    type Fitted = FittedPipeline;

    fn fit(&self, rows: &[OrderFeatures], labels: &[bool]) -> Result<FittedPipeline> {
        ensure!(!rows.is_empty(), "no training rows");

        let preprocessor = self.preprocessor.fit(rows, labels)?;
        info!(
            "Fitted {} stage: {} output columns",
            Self::STAGES[0],
            preprocessor.output_width()
        );

        let encoded = preprocessor.transform_all(rows);
        let model = self.model.fit(&encoded, labels)?;
        info!("Fitted {} stage: {} trees", Self::STAGES[1], model.trees().len());

        Ok(FittedPipeline { preprocessor, model })
    }
}

/// Frozen pipeline. Nothing mutates it after fitting; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    preprocessor: ColumnTransformer,
    model: RandomForest,
}

impl FittedPipeline {
    pub fn from_parts(preprocessor: ColumnTransformer, model: RandomForest) -> Result<Self> {
        let pipeline = Self { preprocessor, model };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Checks that the stages fit together. A pipeline decoded from disk has
    /// not been through `from_parts` and must pass this before it scores.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.preprocessor.output_width() == self.model.n_features(),
            "preprocessor emits {} columns but the model expects {}",
            self.preprocessor.output_width(),
            self.model.n_features()
        );
        self.model.validate()
    }

    pub fn preprocessor(&self) -> &ColumnTransformer {
        &self.preprocessor
    }

    pub fn model(&self) -> &RandomForest {
        &self.model
    }

    /// Probability that the order arrives after its estimate.
    pub fn predict_proba(&self, row: &OrderFeatures) -> f64 {
        self.model.predict_proba(&self.preprocessor.transform(row))
    }

    pub fn predict_proba_all(&self, rows: &[OrderFeatures]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_proba(r)).collect()
    }
}
