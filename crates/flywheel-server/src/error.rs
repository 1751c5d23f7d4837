//! API error type mapping domain failures to HTTP status codes.
//!
//! All domain errors are local, recoverable conditions returned to the
//! caller; only a lineage invariant breach is surfaced as a 500, since it
//! indicates a locking bug rather than a bad request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flywheel_experiments::ExperimentError;
use flywheel_registry::RegistryError;
use flywheel_training::TrainingError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("internal invariant breach: {0}")]
    InvariantBreach(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            Self::InvariantBreach(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invariant_breach"),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Invariant breach surfaced to caller");
        }
        (status, Json(json!({ "error": kind, "message": self.to_string() }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::NotFound(err.to_string()),
            RegistryError::DuplicateName(_) => Self::Conflict(err.to_string()),
            RegistryError::LineageBreach(_) => Self::InvariantBreach(err.to_string()),
        }
    }
}

impl From<TrainingError> for ApiError {
    fn from(err: TrainingError) -> Self {
        match err {
            TrainingError::UnknownJob(_) => Self::NotFound(err.to_string()),
            TrainingError::Conflict { .. } | TrainingError::InvalidTransition { .. } => {
                Self::Conflict(err.to_string())
            }
            TrainingError::InvalidProgress { .. }
            | TrainingError::OutOfOrderEpoch { .. }
            | TrainingError::InvalidLoss(_) => Self::Unprocessable(err.to_string()),
            TrainingError::Registry(inner) => inner.into(),
        }
    }
}

impl From<ExperimentError> for ApiError {
    fn from(err: ExperimentError) -> Self {
        match err {
            ExperimentError::NotFound(_) => Self::NotFound(err.to_string()),
            ExperimentError::Validation(_) => Self::Unprocessable(err.to_string()),
        }
    }
}
