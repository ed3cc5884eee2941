use serde_json::{Map, Value};
use std::path::Path;

use crate::contract::{self, BookingRequest, FeatureVector, ValidatedBooking};
use crate::decision::Prediction;
use crate::error::{ArtifactLoadError, InferenceContractError, PredictError};
use crate::model::{ArtifactMeta, Model};

/// Scoring & decision engine. Built once at startup and shared read-only
/// by every request; nothing here takes `&mut self`.
#[derive(Debug)]
pub struct Engine {
    model: Model,
}

impl Engine {
    /// Load and verify the artifact, then run one inference so a broken
    /// artifact fails here and not on the first request.
    pub fn load(model_path: &Path, meta_path: &Path) -> Result<Self, ArtifactLoadError> {
        let model = Model::load(model_path, meta_path)?;
        Self::from_model(model)
    }

    pub fn from_model(model: Model) -> Result<Self, ArtifactLoadError> {
        let engine = Self { model };
        let warm = BookingRequest::baseline().to_vector();
        engine.score(&warm).map_err(|e| {
            ArtifactLoadError::Unsupported(format!("warmup inference failed: {e}"))
        })?;
        tracing::debug!("warmup forward ok");
        Ok(engine)
    }

    pub fn meta(&self) -> &ArtifactMeta {
        self.model.meta()
    }

    pub fn tree_count(&self) -> usize {
        self.model.tree_count()
    }

    pub fn score(&self, vector: &FeatureVector) -> Result<f64, InferenceContractError> {
        self.model.score(vector.as_slice())
    }

    /// Score an already-validated booking.
    pub fn decide(&self, booking: &ValidatedBooking) -> Result<Prediction, InferenceContractError> {
        let p = self.score(&booking.vector)?;
        Ok(Prediction::decide(&booking.request, p))
    }

    /// validate → score → bucket + explain.
    pub fn predict(&self, raw: &Map<String, Value>) -> Result<Prediction, PredictError> {
        let booking = contract::validate(raw)?;
        Ok(self.decide(&booking)?)
    }
}
