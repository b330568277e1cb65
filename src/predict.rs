//! Online single-row scoring against a loaded, immutable artifact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::artifact::{self, ModelArtifact};
use crate::error::{ArtifactError, PredictError};
use crate::models::OrderFeatures;

/// Fixed policy cutoff: probabilities at or above it are labelled late.
pub const LATE_THRESHOLD: f64 = 0.5;

/// A prediction request carries exactly the model-facing order attributes.
pub type PredictionRequest = OrderFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "LATE")]
    Late,
    #[serde(rename = "ON-TIME")]
    OnTime,
}

impl RiskLabel {
    pub fn from_probability(probability_late: f64) -> Self {
        if probability_late >= LATE_THRESHOLD {
            RiskLabel::Late
        } else {
            RiskLabel::OnTime
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Late => "LATE",
            RiskLabel::OnTime => "ON-TIME",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub probability_late: f64,
    pub label: RiskLabel,
}

fn validate(request: &PredictionRequest) -> Result<(), PredictError> {
    for (name, value) in [
        ("price", request.price),
        ("freight_value", request.freight_value),
        ("estimated_delivery_days", request.estimated_delivery_days),
    ] {
        if !value.is_finite() {
            return Err(PredictError::invalid(format!("{} must be a finite number", name)));
        }
    }
    if !(0..=6).contains(&request.purchase_dow) {
        return Err(PredictError::invalid(format!(
            "purchase_dow must be 0 (Sunday) to 6 (Saturday), got {}",
            request.purchase_dow
        )));
    }
    if !(1..=12).contains(&request.purchase_month) {
        return Err(PredictError::invalid(format!(
            "purchase_month must be 1 to 12, got {}",
            request.purchase_month
        )));
    }
    Ok(())
}

/// Cheap to clone; every clone shares the same frozen artifact.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: Arc<ModelArtifact>,
}

impl Predictor {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self { artifact: Arc::new(artifact) }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let artifact = artifact::load(path)?;
        info!(
            "Loaded model artifact from {} (trained {}, {} trees)",
            path.display(),
            artifact.trained_at,
            artifact.pipeline.model().trees().len()
        );
        Ok(Self::new(artifact))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Unknown or missing categorical values score with the unknown
    /// encoding; they never fail the request.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
        validate(request)?;
        let probability_late = self.artifact.pipeline.predict_proba(request).clamp(0.0, 1.0);
        Ok(Prediction {
            probability_late,
            label: RiskLabel::from_probability(probability_late),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::artifact::{TrainingSummary, ARTIFACT_FORMAT};
    use crate::config::TrainingConfig;
    use crate::ml::forest::DecisionTree;
    use crate::ml::{ColumnTransformerSpec, Estimator, EvaluationReport, FittedPipeline, RandomForest};
    use chrono::Utc;

    pub(crate) fn request(category: Option<&str>) -> PredictionRequest {
        OrderFeatures {
            customer_state: Some("SP".into()),
            seller_state: Some("SP".into()),
            product_category_name: category.map(str::to_string),
            price: 100.0,
            freight_value: 20.0,
            estimated_delivery_days: 7.0,
            purchase_dow: 2,
            purchase_month: 5,
            purchase_year: 2018,
        }
    }

    /// Artifact whose forest always answers `leaf_probabilities` averaged.
    pub(crate) fn constant_artifact(leaf_probabilities: &[f64]) -> ModelArtifact {
        let rows = vec![request(Some("toys")), request(Some("bed_bath_table"))];
        let preprocessor = ColumnTransformerSpec.fit(&rows, &[false, true]).unwrap();
        let trees = leaf_probabilities.iter().map(|p| DecisionTree::leaf(*p)).collect();
        let model = RandomForest::from_trees(preprocessor.output_width(), trees);
        let pipeline = FittedPipeline::from_parts(preprocessor, model).unwrap();

        ModelArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            trained_at: Utc::now(),
            summary: TrainingSummary {
                n_rows: 2,
                n_train: 2,
                n_test: 0,
                train_late_rate: 0.5,
                test_late_rate: 0.0,
                n_encoded_features: pipeline.preprocessor().output_width(),
                config: TrainingConfig::default(),
            },
            evaluation: EvaluationReport::compute(&[], &[], LATE_THRESHOLD),
            pipeline,
        }
    }

    #[test]
    fn test_threshold_boundary_is_late() {
        let predictor = Predictor::new(constant_artifact(&[1.0, 0.0]));
        let prediction = predictor.predict(&request(Some("toys"))).unwrap();
        assert_eq!(prediction.probability_late, 0.5);
        assert_eq!(prediction.label, RiskLabel::Late);
    }

    #[test]
    fn test_below_threshold_is_on_time() {
        let predictor = Predictor::new(constant_artifact(&[0.25, 0.5]));
        let prediction = predictor.predict(&request(None)).unwrap();
        assert_eq!(prediction.label, RiskLabel::OnTime);
    }

    #[test]
    fn test_unknown_inputs_do_not_fail() {
        let predictor = Predictor::new(constant_artifact(&[0.3]));
        let mut req = request(Some("never_seen_category"));
        req.customer_state = None;
        req.seller_state = Some("XX".into());
        let prediction = predictor.predict(&req).unwrap();
        assert!((0.0..=1.0).contains(&prediction.probability_late));
    }

    #[test]
    fn test_rejects_out_of_range_calendar() {
        let predictor = Predictor::new(constant_artifact(&[0.3]));
        let mut req = request(None);
        req.purchase_month = 13;
        assert!(matches!(predictor.predict(&req), Err(PredictError::InvalidRequest(_))));

        let mut req = request(None);
        req.price = f64::NAN;
        assert!(predictor.predict(&req).is_err());
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(serde_json::to_string(&RiskLabel::OnTime).unwrap(), "\"ON-TIME\"");
        assert_eq!(RiskLabel::Late.to_string(), "LATE");
    }

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let err = Predictor::load(Path::new("/nonexistent/delivery_risk_model.bin")).unwrap_err();
        assert!(matches!(err, ArtifactError::Unavailable { .. }));
        assert!(err.to_string().contains("model artifact unavailable"));
    }

    #[test]
    fn test_artifact_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let artifact = constant_artifact(&[0.8, 0.6]);
        artifact::save(&path, &artifact).unwrap();

        let predictor = Predictor::load(&path).unwrap();
        assert_eq!(predictor.artifact(), &artifact);
    }

    #[test]
    fn test_garbage_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(matches!(Predictor::load(&path), Err(ArtifactError::Corrupt { .. })));
    }

    /// Encodes an artifact around `model` without going through
    /// `FittedPipeline::from_parts`, the way a stale or hand-edited file would.
    fn write_unchecked(path: &Path, model: RandomForest) {
        let valid = constant_artifact(&[0.5]);
        // Field order of `ModelArtifact` and `FittedPipeline`.
        let raw = (
            &valid.format,
            valid.trained_at,
            &valid.summary,
            &valid.evaluation,
            (valid.pipeline.preprocessor(), &model),
        );
        std::fs::write(path, bincode::serialize(&raw).unwrap()).unwrap();
    }

    fn corrupt_reason(path: &Path) -> String {
        match Predictor::load(path) {
            Err(ArtifactError::Corrupt { reason, .. }) => reason,
            other => panic!("expected a corrupt artifact, got {:?}", other.map(|p| p.artifact().format.clone())),
        }
    }

    #[test]
    fn test_unchecked_encoding_of_valid_model_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let width = constant_artifact(&[0.5]).pipeline.preprocessor().output_width();
        write_unchecked(&path, RandomForest::from_trees(width, vec![DecisionTree::leaf(0.7)]));

        let prediction = Predictor::load(&path).unwrap().predict(&request(None)).unwrap();
        assert_eq!(prediction.probability_late, 0.7);
    }

    #[test]
    fn test_forest_without_trees_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let width = constant_artifact(&[0.5]).pipeline.preprocessor().output_width();
        write_unchecked(&path, RandomForest::from_trees(width, vec![]));

        assert!(corrupt_reason(&path).contains("no trees"));
    }

    #[test]
    fn test_model_width_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let width = constant_artifact(&[0.5]).pipeline.preprocessor().output_width();
        write_unchecked(&path, RandomForest::from_trees(width + 50, vec![DecisionTree::leaf(0.5)]));

        assert!(corrupt_reason(&path).contains("model expects"));
    }
}
