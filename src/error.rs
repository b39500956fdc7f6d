//! Mapping of failures onto HTTP responses.

use axum::http::StatusCode;
use tracing::error;

use crate::engine::EngineError;

pub type ApiError = (StatusCode, String);

/// Persistence or other unexpected failure.
pub fn internal(e: anyhow::Error) -> ApiError {
    error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub fn not_found(what: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

/// A command the engine refused.
pub fn rejected(e: EngineError) -> ApiError {
    let status = match e {
        EngineError::UnknownDose { .. } | EngineError::UnknownSlot { .. } => StatusCode::NOT_FOUND,
        EngineError::InvalidTimeOfDay(_) | EngineError::InvalidReading(_) => StatusCode::BAD_REQUEST,
        EngineError::FutureDay(_)
        | EngineError::InactiveOnDay(..)
        | EngineError::ReminderInactive(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, e.to_string())
}
