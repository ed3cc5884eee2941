use std::{fmt, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

// ---------- Request-scoped: caller sent something we cannot score ----------

/// What is wrong with one field of a booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FieldProblem {
    Missing,
    WrongType { expected: &'static str },
    OutOfDomain { domain: &'static str },
    /// The payload itself was not a JSON object.
    NotAnObject,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::WrongType { expected } => write!(f, "expected {expected}"),
            Self::OutOfDomain { domain } => write!(f, "outside domain {domain}"),
            Self::NotAnObject => f.write_str("request body must be a JSON object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    #[serde(flatten)]
    pub problem: FieldProblem,
}

/// Every offending field of a rejected request, in canonical feature order.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid booking request: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn missing_fields(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.problem == FieldProblem::Missing)
            .map(|i| i.field.as_str())
            .collect()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{} ({})", i.field, i.problem))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------- Startup-fatal: the artifact cannot back this contract ----------

#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("scoring artifact not found at {path}")]
    Missing { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported artifact: {0}")]
    Unsupported(String),

    #[error("corrupt tree {tree}: {detail}")]
    CorruptTree { tree: usize, detail: String },

    #[error("artifact expects {found} input features, contract defines {expected}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("feature order mismatch: contract {expected:?}, artifact {found:?}")]
    FeatureOrderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("contract version mismatch: serving v{expected}, artifact built for v{found}")]
    ContractVersionMismatch { expected: u32, found: u32 },

    #[error("positive class mismatch: serving reads class {expected}, artifact declares {found}")]
    PositiveClassMismatch { expected: usize, found: usize },
}

// ---------- Request-scoped but deployment-level: artifact and contract drifted ----------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceContractError {
    #[error("feature length mismatch: got {found}, artifact expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("tree {tree} references feature {index} outside a {dim}-wide input")]
    SplitOutOfRange { tree: usize, index: usize, dim: usize },

    #[error("artifact produced a non-finite margin ({0})")]
    NonFinite(f32),
}

/// Failure of a single prediction. The two kinds must stay distinguishable:
/// one is the caller's fault, the other means the deployment is broken.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("inference contract violated: {0}")]
    Contract(#[from] InferenceContractError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}
