//! Application error type and its HTTP mapping.
//!
//! Every failure that can reach a client is an [`AppError`]. Store and cache errors are
//! converted at the service boundary; their driver text is logged and never serialized.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::repositories::StoreError;
use crate::utils::url_validator::Rejection;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Machine-readable error payload shared by all error responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed input the caller can fix (400).
    #[error("{message}")]
    Validation { message: String, details: Value },

    /// Destination rejected by policy: SSRF, redirect chains, denylists (400).
    #[error("{message}")]
    PolicyViolation { message: String, details: Value },

    #[error("{message}")]
    Unauthorized { message: String, details: Value },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    /// Caller exceeded its request budget (429).
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64, limit: u64 },

    /// The retry budget for code allocation ran out (500).
    #[error("Failed to allocate a unique short code")]
    CodeAllocationExhausted,

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn policy(message: impl Into<String>, details: Value) -> Self {
        Self::PolicyViolation {
            message: message.into(),
            details,
        }
    }

    pub fn unauthorized(message: impl Into<String>, details: Value) -> Self {
        Self::Unauthorized {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Logs a store failure and returns a sanitized 500 naming the failed operation.
    pub fn from_store(error: &StoreError, operation: &'static str) -> Self {
        tracing::error!(error = %error, operation, "store error");
        Self::internal(operation, json!({}))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::PolicyViolation { .. } => (StatusCode::BAD_REQUEST, "policy_violation"),
            Self::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            Self::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            Self::CodeAllocationExhausted => {
                (StatusCode::INTERNAL_SERVER_ERROR, "code_allocation_exhausted")
            }
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        self.status_and_code().0
    }

    /// Converts the error into the serializable payload.
    pub fn to_error_info(&self) -> ErrorInfo {
        let (_, code) = self.status_and_code();
        let details = match self {
            Self::Validation { details, .. }
            | Self::PolicyViolation { details, .. }
            | Self::Unauthorized { details, .. }
            | Self::NotFound { details, .. }
            | Self::Internal { details, .. } => details.clone(),
            Self::RateLimited { retry_after, limit } => {
                json!({ "retry_after": retry_after, "limit": limit })
            }
            Self::CodeAllocationExhausted => json!({}),
        };

        ErrorInfo {
            code,
            message: self.to_string(),
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_error_info(),
        };

        let mut response = (status, Json(body)).into_response();

        match &self {
            Self::RateLimited { retry_after, .. } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            }
            Self::Unauthorized { .. } => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
            }
            _ => {}
        }

        response
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(errors.field_errors()).unwrap_or_else(|_| json!({}));
        AppError::bad_request("Request validation failed", details)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let reason = match &rejection {
            JsonRejection::MissingJsonContentType(_) => "missing_json_content_type",
            JsonRejection::JsonSyntaxError(_) => "json_syntax_error",
            JsonRejection::JsonDataError(_) => "json_data_error",
            _ => "unreadable_body",
        };
        AppError::bad_request(
            "Invalid JSON body",
            json!({ "reason": reason, "error": rejection.body_text() }),
        )
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        let details = json!({ "reason": rejection.reason_code() });
        match rejection {
            Rejection::TooLong { .. } | Rejection::Malformed => {
                AppError::bad_request(rejection.to_string(), details)
            }
            _ => AppError::policy(rejection.to_string(), details),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "database error");
        AppError::internal("Database error", json!({}))
    }
}
