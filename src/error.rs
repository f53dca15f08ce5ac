// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::session::{IneligibleReason, SessionError};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden, with a machine-readable reason for the redirect
    Ineligible(String, &'static str),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., action not allowed in the current phase)
    Conflict(String),

    // 503 Service Unavailable; the client may retry
    Retryable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, reason) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Ineligible(msg, reason) => (StatusCode::FORBIDDEN, msg, Some(reason)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::Retryable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, Some("retry")),
        };
        let body = match reason {
            Some(reason) => Json(json!({ "error": error_message, "reason": reason })),
            None => Json(json!({ "error": error_message })),
        };

        (status, body).into_response()
    }
}

/// Maps the session taxonomy onto HTTP.
impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let msg = err.to_string();
        match err {
            SessionError::NotFound(_) | SessionError::NoActiveAttempt => AppError::NotFound(msg),
            SessionError::DeadlinePassed => {
                AppError::Ineligible(msg, reason_code(IneligibleReason::DeadlinePassed))
            }
            SessionError::QuotaExceeded => {
                AppError::Ineligible(msg, reason_code(IneligibleReason::QuotaExceeded))
            }
            SessionError::NotYetOpen => {
                AppError::Ineligible(msg, reason_code(IneligibleReason::NotYetOpen))
            }
            SessionError::TimeUp
            | SessionError::InvalidPhase(_)
            | SessionError::ConfirmationRequired => AppError::Conflict(msg),
            SessionError::InvalidOption(_) | SessionError::IndexOutOfRange { .. } => {
                AppError::BadRequest(msg)
            }
            SessionError::SubmissionWriteFailed(_) => AppError::Retryable(msg),
            SessionError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

fn reason_code(reason: IneligibleReason) -> &'static str {
    match reason {
        IneligibleReason::DeadlinePassed => "deadline_passed",
        IneligibleReason::QuotaExceeded => "quota_exceeded",
        IneligibleReason::NotYetOpen => "not_yet_open",
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
