use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error code the service uses for an expired credential.
///
/// This is the only code the request client retries transparently.
pub const TOKEN_EXPIRED_CODE: i64 = 40;

/// Broad error category used for caller-side handling and retry decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller misuse or data that violates a reconciliation invariant.
    Validation,
    /// Authentication/authorization failure.
    Auth,
    /// Structured application error returned by the service.
    Application,
    /// Rate-limited by the service.
    RateLimited,
    /// No response was received.
    Transport,
    /// The service answered with a server-side failure (5xx).
    Server,
    /// The owning client was marked disconnected.
    Disconnected,
    /// Serialization/deserialization failure.
    Serialization,
    /// Internal bug or invariant break.
    Internal,
}

/// Errors raised while reconciling thread state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// A reply was offered to a thread whose root it does not point at.
    #[error(
        "message '{message_id}' does not belong to thread '{thread_root_id}' (parent_id: {parent_id:?})"
    )]
    MessageNotInThread {
        message_id: String,
        parent_id: Option<String>,
        thread_root_id: String,
    },
}

impl ThreadError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MessageNotInThread { .. } => ErrorCategory::Validation,
        }
    }
}

/// Map HTTP status codes to error categories.
pub fn classify_http_status(status: u16) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Auth,
        408 | 429 => ErrorCategory::RateLimited,
        400..=499 => ErrorCategory::Application,
        500..=599 => ErrorCategory::Server,
        _ => ErrorCategory::Internal,
    }
}

/// Map an application error code from the service envelope to a category.
///
/// Only the token-expiry code carries a dedicated meaning; the HTTP status is
/// used for everything else.
pub fn classify_api_code(code: i64, status: u16) -> ErrorCategory {
    if code == TOKEN_EXPIRED_CODE {
        return ErrorCategory::Auth;
    }
    match classify_http_status(status) {
        ErrorCategory::Internal => ErrorCategory::Application,
        other => other,
    }
}
