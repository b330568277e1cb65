//! Model fitting building blocks.

pub mod evaluation;
pub mod forest;
pub mod pipeline;
pub mod preprocess;
pub mod split;

pub use evaluation::EvaluationReport;
pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use pipeline::{FittedPipeline, PipelineSpec};
pub use preprocess::{CategoryCode, ColumnTransformer, ColumnTransformerSpec};
pub use split::{stratified_split, Split, SplitStrategy};

use anyhow::Result;

/// Fit half of a stage: learns parameters from rows and labels and returns
/// the frozen, apply-only counterpart.
pub trait Estimator<X> {
    type Fitted;

    fn fit(&self, rows: &[X], labels: &[bool]) -> Result<Self::Fitted>;
}
