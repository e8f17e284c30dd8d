use chat_core::{ErrorCategory, TOKEN_EXPIRED_CODE, classify_api_code, classify_http_status};
use thiserror::Error;

use crate::{
    envelope::{ApiErrorEnvelope, error_code, error_message},
    transport::{HttpResponse, TransportError},
};

/// Structured application error carried by a response.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Application error code, when the body carried an envelope.
    pub code: Option<i64>,
    pub message: String,
    /// HTTP status of the response.
    pub status: u16,
    /// Typed envelope, when every field matched its declared shape.
    pub envelope: Option<ApiErrorEnvelope>,
    /// The response exactly as received.
    pub response: HttpResponse,
}

impl ApiError {
    pub fn from_response(response: HttpResponse) -> Self {
        let status = response.status;
        let envelope = ApiErrorEnvelope::from_body(&response.body);
        let code = error_code(&response.body);
        let message = match code {
            Some(code) => format!(
                "chat error code {code}: {}",
                error_message(&response.body).unwrap_or_default()
            ),
            None => format!("chat error HTTP code: {status}"),
        };

        Self {
            code,
            message,
            status,
            envelope,
            response,
        }
    }

    pub fn is_token_expired(&self) -> bool {
        self.code == Some(TOKEN_EXPIRED_CODE)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code {
            Some(code) => classify_api_code(code, self.status),
            None => classify_http_status(self.status),
        }
    }
}

/// Errors returned by [`crate::ResilientRequestClient`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// The service answered with an error (envelope or non-2xx status).
    #[error(transparent)]
    Api(#[from] ApiError),
    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The client was marked disconnected before the call.
    #[error("client is disconnected")]
    Disconnected,
    /// A successful body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RequestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Api(err) => err.category(),
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Disconnected => ErrorCategory::Disconnected,
            Self::Decode(_) => ErrorCategory::Serialization,
        }
    }

    /// Application error code, if the failure carried one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Api(err) => err.code,
            _ => None,
        }
    }

    /// HTTP status, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => Some(err.status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builds_error_from_envelope() {
        let err = ApiError::from_response(HttpResponse {
            status: 200,
            body: json!({ "code": 4, "message": "bad input", "StatusCode": 400 }),
        });

        assert_eq!(err.code, Some(4));
        assert_eq!(err.status, 200);
        assert_eq!(err.to_string(), "chat error code 4: bad input");
        assert_eq!(err.category(), ErrorCategory::Application);
        assert!(!err.is_token_expired());
    }

    #[test]
    fn builds_error_from_bare_status() {
        let err = ApiError::from_response(HttpResponse {
            status: 503,
            body: json!("Service Unavailable"),
        });

        assert_eq!(err.code, None);
        assert_eq!(err.to_string(), "chat error HTTP code: 503");
        assert_eq!(err.category(), ErrorCategory::Server);
    }

    #[test]
    fn recognizes_token_expiry() {
        let err = ApiError::from_response(HttpResponse {
            status: 401,
            body: json!({ "code": TOKEN_EXPIRED_CODE, "message": "token expired" }),
        });
        assert!(err.is_token_expired());
        assert_eq!(RequestError::from(err).category(), ErrorCategory::Auth);
    }

    #[test]
    fn keeps_code_when_envelope_fields_are_off_shape() {
        let err = ApiError::from_response(HttpResponse {
            status: 401,
            body: json!({ "code": TOKEN_EXPIRED_CODE, "details": { "messages": ["jwt expired"] } }),
        });

        assert_eq!(err.code, Some(TOKEN_EXPIRED_CODE));
        assert_eq!(err.envelope, None);
        assert!(err.is_token_expired());
        assert_eq!(err.to_string(), "chat error code 40: ");
    }

    #[test]
    fn exposes_code_and_status_for_callers() {
        let err = RequestError::Api(ApiError::from_response(HttpResponse {
            status: 429,
            body: json!({ "code": 9, "message": "slow down" }),
        }));
        assert_eq!(err.code(), Some(9));
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.category(), ErrorCategory::RateLimited);

        assert_eq!(RequestError::Disconnected.category(), ErrorCategory::Disconnected);
        assert_eq!(RequestError::Disconnected.status(), None);
    }
}
