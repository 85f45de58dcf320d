//! Control-plane error taxonomy
//!
//! Every control operation fails with a structured kind tag plus a short
//! human message; handlers map these onto HTTP status codes.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    AlreadyRunning,
    NotRunning,
    Timeout,
    AdapterFailure,
    PartialFailure,
    ConfigInvalid,
    Unauthorized,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlError {
    pub kind: ErrorKind,
    #[serde(rename = "error")]
    pub message: String,
}

impl ControlError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_running(source: &str) -> Self {
        Self::new(
            ErrorKind::AlreadyRunning,
            format!("a sync for {} is already in flight", source),
        )
    }

    pub fn not_running(source: &str) -> Self {
        Self::new(
            ErrorKind::NotRunning,
            format!("{} has no running sync to stop", source),
        )
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AdapterFailure, message)
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyRunning | ErrorKind::NotRunning => StatusCode::CONFLICT,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::AdapterFailure | ErrorKind::PartialFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::ConfigInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ControlError {}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}
