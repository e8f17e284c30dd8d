//! HTTP request layer for the chat service: identity/auth enrichment,
//! error-envelope classification and transparent token-expiry retry.

/// Wallet-signature auth handshake.
pub mod auth;
/// Resilient request client with token-expiry retry.
pub mod client;
/// Environment-backed client configuration.
pub mod config;
/// Service error-body detection.
pub mod envelope;
/// Request and application errors.
pub mod error;
/// Transport seam and the `reqwest` implementation.
pub mod transport;

pub use auth::{AuthChallenge, TokenGrant, WalletAuth};
pub use client::{
    API_KEY_PARAM, CLIENT_IDENTITY_HEADER, REQUEST_ID_HEADER, RequestOptions,
    ResilientRequestClient,
};
pub use config::{ClientConfig, ConfigError};
pub use envelope::{
    ApiErrorEnvelope, ErrorDetails, error_code, error_message, is_error_response,
};
pub use error::{ApiError, RequestError};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, ReqwestTransport,
    TransportError,
};
