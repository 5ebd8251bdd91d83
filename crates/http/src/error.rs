//! Error handling for the bookshelf HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

/// Message returned to clients for every internal failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred";

/// Standard error response format for all HTTP errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Vec<serde_json::Value>,
    pub trace_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        code: String,
        details: Vec<serde_json::Value>,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
            details: Vec::new(),
        }
    }

    /// Attach structured details to a bad request error
    pub fn with_details(self, details: Vec<serde_json::Value>) -> Self {
        match self {
            Self::BadRequest { message, code, .. } => Self::BadRequest {
                message,
                code,
                details,
            },
            other => other,
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// HTTP status this error renders as
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let status = self.status();

        let (code, message, details) = match self {
            AppError::BadRequest {
                message,
                code,
                details,
            } => {
                tracing::debug!(
                    error_id = %error_id,
                    error_code = %code,
                    status_code = %status.as_u16(),
                    %message,
                    "request rejected"
                );
                (code, message, details)
            }
            AppError::NotFound { message, code } => {
                tracing::debug!(
                    error_id = %error_id,
                    error_code = %code,
                    status_code = %status.as_u16(),
                    %message,
                    "resource not found"
                );
                (code, message, Vec::new())
            }
            AppError::Internal(e) => {
                // The cause stays in the log; clients only see the generic message.
                tracing::error!(
                    error_id = %error_id,
                    status_code = %status.as_u16(),
                    error = ?e,
                    "request failed"
                );
                (
                    "internal_error".to_string(),
                    INTERNAL_ERROR_MESSAGE.to_string(),
                    Vec::new(),
                )
            }
        };

        let body = ErrorEnvelope {
            error: ErrorBody {
                code,
                message,
                details,
                trace_id: error_id.to_string(),
                timestamp,
            },
        };

        (status, Json(body)).into_response()
    }
}
