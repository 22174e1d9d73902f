use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{core::store::StoreError, runtime::handle::RuntimeError};

/// Shorthand result for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP-facing error: status, stable machine code, and a user message.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Stable error code surfaced in the body (`DUPLICATE_CHECKIN`, ...).
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Builds an error from parts.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 400 with code `INVALID_INPUT`.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    /// 500 with code `STORAGE_ERROR`. The detail stays server-side.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "request failed: {}", self.message);
            // Generic message to the client, detail logged above.
            let body = Json(json!({
                "error": self.code,
                "message": "operation failed, retry",
            }));
            return (self.status, body).into_response();
        }

        let body = Json(json!({
            "error": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingPatient(id) => Self::new(
                StatusCode::NOT_FOUND,
                "PATIENT_NOT_FOUND",
                format!("Patient not found: {id}"),
            ),
            StoreError::MissingClinic(id) => Self::new(
                StatusCode::NOT_FOUND,
                "CLINIC_NOT_FOUND",
                format!("Clinic not found: {id}"),
            ),
            StoreError::DuplicateCheckin { clinic_id, .. } => Self::new(
                StatusCode::CONFLICT,
                "DUPLICATE_CHECKIN",
                format!("Already checked in to clinic {clinic_id}"),
            ),
            StoreError::ClinicFull(id) => Self::new(
                StatusCode::CONFLICT,
                "CLINIC_FULL",
                format!("Clinic {id} is at capacity"),
            ),
            other => Self::storage(format!("store error: {other:?}")),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Store(inner) => inner.into(),
            RuntimeError::Persist(inner) => Self::storage(format!("persist error: {inner:?}")),
            RuntimeError::ChannelClosed => Self::storage("queue runtime unavailable"),
        }
    }
}
