//! Error taxonomy and the wire envelope returned to chat clients.
//!
//! DESIGN
//! ======
//! Every failure in the pipeline becomes a [`GatewayError`]. The responder
//! classifies it into one of five [`ErrorKind`]s, logs the full detail, and
//! builds an immutable [`ErrorEnvelope`] that only exposes what the client
//! is allowed to see. 5xx detail is hidden unless running in development.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::llm::types::LlmError;
use crate::rate_limit::{Quota, RateLimitError};
use crate::validate::ValidationError;

const MSG_BAD_REQUEST: &str = "Invalid JSON in request body";
const MSG_BODY_UNREADABLE: &str = "Request body is too large or could not be read";
const MSG_RATE_LIMITED: &str = "Too many requests. Please try again later.";
const MSG_INTERNAL: &str = "An unexpected error occurred. Please try again later.";
const MSG_UPSTREAM_AUTH: &str = "Invalid API key. Please check your configuration.";
const MSG_UPSTREAM_RATE_LIMITED: &str = "Rate limit exceeded. Please try again later.";
const MSG_UPSTREAM_UNAVAILABLE: &str = "The completion service is temporarily unavailable. Please try again later.";
const MSG_UPSTREAM_OTHER: &str = "An error occurred while processing your request";

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    ValidationError,
    RateLimited,
    ProviderError,
    InternalError,
}

impl ErrorKind {
    /// Short code sent as the envelope's `error` field.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::BadRequest => "Invalid request",
            Self::ValidationError => "Validation error",
            Self::RateLimited => "Rate limit exceeded",
            Self::ProviderError => "OpenAI API error",
            Self::InternalError => "Internal server error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("malformed request body: {0}")]
    BadRequest(String),
    /// The body was rejected before it could be parsed (size cap, broken transfer).
    #[error("request body rejected: {0}")]
    BodyRejected(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::BodyRejected(_) => "E_BAD_REQUEST",
            Self::Validation(e) => e.error_code(),
            Self::RateLimited(e) => e.error_code(),
            Self::Provider(e) => e.error_code(),
            Self::Internal(_) => "E_INTERNAL",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::RateLimited(e) => e.retryable(),
            Self::Provider(e) => e.retryable(),
            _ => false,
        }
    }
}

impl GatewayError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) | Self::BodyRejected(_) => ErrorKind::BadRequest,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Provider(LlmError::ApiResponse { .. } | LlmError::ApiRequest(_) | LlmError::ApiParse(_)) => {
                ErrorKind::ProviderError
            }
            // Misconfiguration is ours, not the provider's.
            Self::Provider(_) | Self::Internal(_) => ErrorKind::InternalError,
        }
    }
}

/// Client-facing error. Built once by [`respond`]; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
    /// Present for rate-limit rejections only.
    pub quota: Option<Quota>,
}

// =============================================================================
// RESPONDER
// =============================================================================

/// Classify `err`, log it with full detail, and build the client envelope.
#[must_use]
pub fn respond(err: &GatewayError, dev_mode: bool) -> ErrorEnvelope {
    let kind = err.kind();
    let code = err.error_code();
    let (status, message, quota) = match err {
        GatewayError::BadRequest(_) => (StatusCode::BAD_REQUEST, MSG_BAD_REQUEST.to_string(), None),
        GatewayError::BodyRejected(_) => (StatusCode::BAD_REQUEST, MSG_BODY_UNREADABLE.to_string(), None),
        GatewayError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string(), None),
        GatewayError::RateLimited(RateLimitError::Exceeded { limit, reset_ms }) => (
            StatusCode::TOO_MANY_REQUESTS,
            MSG_RATE_LIMITED.to_string(),
            Some(Quota { limit: *limit, remaining: 0, reset_ms: *reset_ms }),
        ),
        GatewayError::Provider(e) if kind == ErrorKind::ProviderError => {
            let status = provider_status(e);
            (status, provider_message(status).to_string(), None)
        }
        GatewayError::Provider(_) | GatewayError::Internal(_) => {
            let message = if dev_mode { err.to_string() } else { MSG_INTERNAL.to_string() };
            (StatusCode::INTERNAL_SERVER_ERROR, message, None)
        }
    };

    let detail = match err {
        GatewayError::Provider(LlmError::ApiResponse { body, .. }) => body.as_str(),
        _ => "",
    };
    if status.is_server_error() {
        error!(
            kind = ?kind,
            code,
            status = status.as_u16(),
            retryable = err.retryable(),
            error = %err,
            detail,
            "gateway: request failed"
        );
    } else {
        warn!(
            kind = ?kind,
            code,
            status = status.as_u16(),
            retryable = err.retryable(),
            error = %err,
            detail,
            "gateway: request rejected"
        );
    }

    ErrorEnvelope { kind, status, message, code, quota }
}

/// Upstream status when it is a client or server error, else 500.
fn provider_status(err: &LlmError) -> StatusCode {
    match err {
        LlmError::ApiResponse { status, .. } => StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn provider_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 => MSG_UPSTREAM_AUTH,
        429 => MSG_UPSTREAM_RATE_LIMITED,
        500 => MSG_UPSTREAM_UNAVAILABLE,
        _ => MSG_UPSTREAM_OTHER,
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.kind.label(),
            "message": self.message,
            "code": self.code,
        });
        match self.quota {
            Some(quota) => {
                body["reset"] = json!(quota.reset_ms);
                (self.status, quota.headers(), Json(body)).into_response()
            }
            None => (self.status, Json(body)).into_response(),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
