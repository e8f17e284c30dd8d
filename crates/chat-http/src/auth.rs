//! Wallet-signature authentication handshake.
//!
//! The flow is `start_auth` (server issues a challenge), the wallet signs it
//! out of band, `get_auth` submits the signature, and `get_token` exchanges
//! the wallet address for a session token.

use std::collections::BTreeMap;

use chat_core::Extra;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    client::{API_KEY_PARAM, ResilientRequestClient},
    error::RequestError,
    transport::{HttpTransport, ReqwestTransport},
};

/// Challenge returned by the auth start endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthChallenge {
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Session token issued for a wallet address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenGrant {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Wallet auth endpoints bound to one address.
#[derive(Debug)]
pub struct WalletAuth<T: HttpTransport = ReqwestTransport> {
    client: ResilientRequestClient<T>,
    address: String,
}

impl<T: HttpTransport> WalletAuth<T> {
    pub fn new(client: ResilientRequestClient<T>, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn client(&self) -> &ResilientRequestClient<T> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut ResilientRequestClient<T> {
        &mut self.client
    }

    pub async fn start_auth(&self) -> Result<AuthChallenge, RequestError> {
        let url = self.client.url_for("wallets/auth/start");
        self.client
            .post(&url, json!({ "address": self.address }), BTreeMap::new())
            .await
    }

    /// Submit the wallet's signature over the challenge `nonce`.
    pub async fn get_auth(&self, signature: &str, nonce: &str) -> Result<Value, RequestError> {
        let url = self.client.url_for("wallets/auth");
        let body = json!({
            "address": self.address,
            "signature": signature,
            "nonce": nonce,
        });
        self.client.post(&url, body, BTreeMap::new()).await
    }

    /// Fetch a session token. `api_key` overrides the client's key when given
    /// and non-empty.
    pub async fn get_token(&self, api_key: Option<&str>) -> Result<TokenGrant, RequestError> {
        let key = api_key
            .filter(|key| !key.is_empty())
            .unwrap_or(self.client.api_key());
        let url = self.client.url_for("get_token");
        let params = BTreeMap::from([
            (API_KEY_PARAM.to_owned(), key.to_owned()),
            ("address".to_owned(), self.address.clone()),
        ]);
        self.client.get(&url, params).await
    }

    /// Fail every later call on this handshake fast.
    pub fn disconnect(&self) {
        info!(address = %self.address, "wallet auth disconnected");
        self.client.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chat_core::TOKEN_EXPIRED_CODE;

    use super::*;
    use crate::transport::{HttpRequest, HttpResponse, Method, RequestBody, TransportError};

    #[derive(Debug, Clone, Default)]
    struct RecordingTransport {
        responses: Arc<Mutex<Vec<HttpResponse>>>,
        seen: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl RecordingTransport {
        fn replying(responses: Vec<HttpResponse>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Arc::new(Mutex::new(responses)),
                seen: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().expect("seen lock").clone()
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().expect("seen lock").push(request.clone());
            self.responses
                .lock()
                .expect("responses lock")
                .pop()
                .ok_or_else(|| TransportError::Other("no scripted response".into()))
        }
    }

    fn ok(body: Value) -> HttpResponse {
        HttpResponse { status: 200, body }
    }

    fn wallet(responses: Vec<HttpResponse>) -> WalletAuth<RecordingTransport> {
        let mut client =
            ResilientRequestClient::with_transport(RecordingTransport::replying(responses), "key-1");
        client.set_base_url("https://chat.example.org/v1");
        WalletAuth::new(client, "0xabc")
    }

    #[tokio::test]
    async fn start_auth_posts_address() {
        let auth = wallet(vec![ok(json!({ "nonce": "n-1", "challenge": "sign me" }))]);

        let challenge = auth.start_auth().await.expect("challenge");

        assert_eq!(challenge.nonce.as_deref(), Some("n-1"));
        assert_eq!(challenge.extra["challenge"], "sign me");
        let request = &auth.client().transport().requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://chat.example.org/v1/wallets/auth/start");
        assert_eq!(request.body, RequestBody::Json(json!({ "address": "0xabc" })));
    }

    #[tokio::test]
    async fn get_auth_submits_signature() {
        let auth = wallet(vec![ok(json!({ "ok": true }))]);

        let result = auth.get_auth("sig", "n-1").await.expect("auth");

        assert_eq!(result, json!({ "ok": true }));
        let request = &auth.client().transport().requests()[0];
        assert_eq!(request.url, "https://chat.example.org/v1/wallets/auth");
        assert_eq!(
            request.body,
            RequestBody::Json(json!({ "address": "0xabc", "signature": "sig", "nonce": "n-1" }))
        );
    }

    #[tokio::test]
    async fn get_token_uses_client_key_unless_overridden() {
        let auth = wallet(vec![
            ok(json!({ "token": "t-1", "refresh_token": "r-1" })),
            ok(json!({ "token": "t-2" })),
        ]);

        let first = auth.get_token(None).await.expect("first token");
        let second = auth.get_token(Some("other-key")).await.expect("second token");

        assert_eq!(first.token, "t-1");
        assert_eq!(first.refresh_token.as_deref(), Some("r-1"));
        assert_eq!(second.token, "t-2");

        let requests = auth.client().transport().requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, "https://chat.example.org/v1/get_token");
        assert_eq!(requests[0].query.get("api_key").map(String::as_str), Some("key-1"));
        assert_eq!(requests[0].query.get("address").map(String::as_str), Some("0xabc"));
        assert_eq!(requests[1].query.get("api_key").map(String::as_str), Some("other-key"));
    }

    #[tokio::test(start_paused = true)]
    async fn get_token_recovers_from_token_expiry() {
        let auth = wallet(vec![
            HttpResponse {
                status: 401,
                body: json!({ "code": TOKEN_EXPIRED_CODE }),
            },
            ok(json!({ "token": "t-1" })),
        ]);

        let started = tokio::time::Instant::now();
        let grant = auth.get_token(None).await.expect("token after retry");

        assert_eq!(started.elapsed(), std::time::Duration::ZERO);
        assert_eq!(grant.token, "t-1");
        assert_eq!(auth.client().transport().requests().len(), 2);
    }

    #[tokio::test]
    async fn disconnect_blocks_further_calls() {
        let auth = wallet(vec![ok(json!({ "token": "t-1" }))]);
        auth.disconnect();

        let err = auth.get_token(None).await.expect_err("disconnected");

        assert!(matches!(err, RequestError::Disconnected));
        assert!(auth.client().transport().requests().is_empty());
    }
}
