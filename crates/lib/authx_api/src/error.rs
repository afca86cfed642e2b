//! Application error types.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use authx_core::adapters::AdapterError;
use authx_core::exchange::ExchangeError;
use authx_core::session::SessionError;
use authx_core::store::StoreError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Generic error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// OAuth2 error body.
#[derive(Debug, Serialize)]
pub struct OAuthErrorResponse {
    pub error: &'static str,
    pub error_description: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    /// Form validation failures, rendered as `{field: [messages]}`.
    #[error("Validation error: {0:?}")]
    FieldErrors(BTreeMap<String, Vec<String>>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::FieldErrors(fields) => {
                return (StatusCode::BAD_REQUEST, Json(fields)).into_response();
            }
            AppError::InvalidRequest(description) => {
                let body = Json(OAuthErrorResponse {
                    error: "invalid_request",
                    error_description: description,
                });
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m),
            AppError::Internal(detail) => {
                error!(error = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<AdapterError> for AppError {
    fn from(e: AdapterError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<ExchangeError> for AppError {
    fn from(e: ExchangeError) -> Self {
        if let Some(fields) = e.field_errors() {
            return AppError::FieldErrors(fields);
        }
        match e {
            ExchangeError::UnknownBackend(name) => {
                AppError::NotFound(format!("Unknown social backend '{name}'"))
            }
            ExchangeError::MethodNotAllowed => AppError::InvalidRequest(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NoBackend(_) => {
                AppError::Unauthorized("No authentication backend recognizes this user".into())
            }
            SessionError::LifetimeOutOfRange => {
                AppError::Internal("Session lifetime is out of range".into())
            }
            SessionError::Store(e) => AppError::from(e),
        }
    }
}
