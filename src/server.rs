use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::contract::{self, feature_names, FeatureVector, CONTRACT_VERSION};
use crate::decision::Prediction;
use crate::engine::Engine;

pub const PREDICT_ROUTE: &str = "/v1/predict/booking_success";

type ApiError = (StatusCode, Json<Value>);

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    log_predictions: bool,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, log_predictions: bool) -> Self {
        Self {
            engine,
            log_predictions,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route(PREDICT_ROUTE, post(predict))
        .with_state(state)
}

// ---------- Handlers ----------

async fn status(State(state): State<AppState>) -> Json<Value> {
    let meta = state.engine.meta();
    Json(json!({
        "message": "booking reliability service is running",
        "model_version": meta.model_version,
        "contract_version": CONTRACT_VERSION,
        "features": feature_names(),
    }))
}

async fn predict(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Prediction>, ApiError> {
    let booking = contract::validate_value(&payload).map_err(|e| {
        tracing::warn!(fields = ?e.fields(), "rejected booking request");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "validation_error", "detail": e.to_string(), "fields": e.issues })),
        )
    })?;

    if state.log_predictions {
        log_vector(&booking.vector);
    }

    // A failure here means the deployed artifact and contract disagree;
    // retrying the same request cannot help.
    let prediction = state.engine.decide(&booking).map_err(|e| {
        tracing::error!(
            error = %e,
            model_version = %state.engine.meta().model_version,
            "inference contract violated"
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "inference_contract_error", "detail": e.to_string() })),
        )
    })?;

    tracing::debug!(
        probability = prediction.probability,
        bucket = %prediction.bucket,
        reasons = prediction.reasons.len(),
        "scored booking"
    );
    Ok(Json(prediction))
}

// Debug signal so an all-zeros or mis-scaled vector is easy to spot.
fn log_vector(vector: &FeatureVector) {
    let xs = vector.as_slice();
    let nz = xs.iter().filter(|x| **x != 0.0).count();
    let mean = xs.iter().sum::<f32>() / xs.len() as f32;
    let sample = vector
        .named()
        .take(6)
        .map(|(name, v)| format!("{name}={v:.3}"))
        .collect::<Vec<_>>()
        .join(", ");
    tracing::info!(
        "recv in_dim={} nonzero={} mean={:.3} sample=[{}]",
        xs.len(),
        nz,
        mean,
        sample
    );
}
