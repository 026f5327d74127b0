//! Rejection rendering
//!
//! The only place a [`GatewayError`] becomes an HTTP response.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// JSON body of every rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatus {
    /// HTTP status code
    pub status: u16,
    /// Public message
    pub message: String,
    /// When the rejection was produced
    pub timestamp: DateTime<Utc>,
}

impl ErrorStatus {
    /// Renders `err` with its public message, stamped now.
    pub fn from_error(err: &GatewayError) -> Self {
        Self::from_error_at(err, Utc::now())
    }

    /// Renders `err` stamped with `timestamp`.
    pub fn from_error_at(err: &GatewayError, timestamp: DateTime<Utc>) -> Self {
        let code = err.code();
        Self {
            status: code.http_status().as_u16(),
            message: code.public_message().to_string(),
            timestamp,
        }
    }

    /// Status as a typed code
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&GatewayError> for ErrorStatus {
    fn from(err: &GatewayError) -> Self {
        Self::from_error(err)
    }
}

impl IntoResponse for ErrorStatus {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        ErrorStatus::from_error(&self).into_response()
    }
}
