use crate::auth::AuthError;
use crate::common::{TransportError, ValidationError};
use crate::http::HttpResponse;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ArmError>;

/// The standard error envelope the management plane returns.
///
/// Responses usually nest the envelope under an `error` key, but some
/// endpoints return it at the top level; both shapes are accepted. When no
/// message can be found the raw body stands in, so the caller always has
/// something concrete to show.
#[derive(Debug, Clone)]
pub struct AzureError {
    pub code: Option<String>,
    pub message: String,
    pub status_code: Option<u16>,
    pub details: Option<Value>,
}

impl AzureError {
    pub fn from_response(response: &HttpResponse) -> Self {
        let mut error = match response.body.as_ref() {
            Some(body) => Self::from_body(body.get("error").unwrap_or(body)),
            None => Self {
                code: None,
                message: format!("{} {}", response.status.as_u16(), response.status_text),
                status_code: None,
                details: None,
            },
        };
        error.status_code = Some(response.status.as_u16());
        error
    }

    /// Reads an error envelope that arrived without an HTTP status of its
    /// own, such as a deployment's `properties.error`.
    pub fn from_body(envelope: &Value) -> Self {
        let code = envelope
            .get("code")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let message = envelope
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| envelope.to_string());
        let details = envelope.get("details").cloned();
        Self {
            code,
            message,
            status_code: None,
            details,
        }
    }
}

impl fmt::Display for AzureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "{} (CODE: {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for AzureError {}

/// Errors surfaced by the resource-management operations.
#[derive(Debug, Error)]
pub enum ArmError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The service answered with a non-success status.
    #[error("{0}")]
    Api(AzureError),

    /// A long-running operation did not settle within the configured window.
    #[error("operation polling timed out after {timeout_minutes} minutes")]
    OperationTimedOut { timeout_minutes: u64 },

    /// The caller cancelled while an operation was still being polled.
    #[error("operation was cancelled while still in progress")]
    OperationCancelled,

    /// A long-running operation settled in a failed state.
    #[error("operation failed: {0}")]
    OperationFailed(AzureError),

    /// The service answered successfully but with a shape the protocol does
    /// not allow.
    #[error("unexpected response shape: expected {expected}, got {actual}")]
    ProtocolViolation { expected: String, actual: String },

    /// An asynchronous response carried neither tracking header.
    #[error("asynchronous response carried no azure-asyncoperation or location header")]
    MissingTrackingUri,
}
