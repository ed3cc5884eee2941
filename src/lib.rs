//! Booking reliability inference: validate a ride-booking feature payload,
//! score it with a gradient-boosted classifier, and return a calibrated
//! success probability, a coarse reliability bucket, and rule-based reasons.

pub mod config;
pub mod contract;
pub mod decision;
pub mod engine;
pub mod error;
pub mod model;
pub mod server;

pub use contract::{validate, BookingRequest, FeatureVector, FEATURE_ORDER};
pub use decision::{bucket, explain, Bucket, Prediction, ReasonCode};
pub use engine::Engine;
pub use error::{ArtifactLoadError, InferenceContractError, PredictError, ValidationError};
