use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

use chat_core::RetryPolicy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::ClientConfig,
    envelope::is_error_response,
    error::{ApiError, RequestError},
    transport::{
        HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, RequestBody,
        TransportError,
    },
};

/// Correlation id header, generated once per logical call.
pub const REQUEST_ID_HEADER: &str = "x-client-request-id";
/// SDK identity header.
pub const CLIENT_IDENTITY_HEADER: &str = "x-stream-client";
/// Query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "api_key";

/// Per-call headers and query parameters layered over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// HTTP client that decorates every call with identity/auth data and retries
/// transparently while the service reports an expired token.
///
/// The consecutive-failure counter is shared by every call made through one
/// instance: it grows on any failure and resets on any success.
#[derive(Debug)]
pub struct ResilientRequestClient<T: HttpTransport = ReqwestTransport> {
    transport: T,
    api_key: String,
    base_url: String,
    user_agent: Option<String>,
    base_options: RequestOptions,
    retry_policy: RetryPolicy,
    consecutive_failures: AtomicU32,
    disconnected: AtomicBool,
}

impl ResilientRequestClient<ReqwestTransport> {
    /// Build a `reqwest`-backed client from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        let mut client = Self::with_transport(transport, config.api_key.clone())
            .with_retry_policy(config.retry_policy);
        client.set_base_url(config.base_url.clone());
        if let Some(user_agent) = &config.user_agent {
            client.set_user_agent(user_agent.clone());
        }
        Ok(client)
    }
}

impl<T: HttpTransport> ResilientRequestClient<T> {
    pub fn with_transport(transport: T, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            base_url: String::new(),
            user_agent: None,
            base_options: RequestOptions::default(),
            retry_policy: RetryPolicy::default(),
            consecutive_failures: AtomicU32::new(0),
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Headers/params applied to every call, winning over per-call options.
    pub fn with_base_options(mut self, base_options: RequestOptions) -> Self {
        self.base_options = base_options;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    /// Absolute URL for `path` under the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(|| {
            format!("chat-sdk-rust-client-{}", env!("CARGO_PKG_VERSION"))
        })
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = Some(user_agent.into());
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Make every later call fail fast with [`RequestError::Disconnected`].
    /// Calls already in flight are not aborted.
    pub fn disconnect(&self) {
        info!("request client disconnected");
        self.disconnected.store(true, Ordering::SeqCst);
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        url: &str,
        params: BTreeMap<String, String>,
    ) -> Result<R, RequestError> {
        let options = RequestOptions {
            params,
            ..RequestOptions::default()
        };
        self.send(Method::Get, url, None, options).await
    }

    pub async fn put<R: DeserializeOwned>(&self, url: &str, body: Value) -> Result<R, RequestError> {
        self.send(Method::Put, url, Some(body), RequestOptions::default())
            .await
    }

    pub async fn post<R: DeserializeOwned>(
        &self,
        url: &str,
        body: Value,
        params: BTreeMap<String, String>,
    ) -> Result<R, RequestError> {
        let options = RequestOptions {
            params,
            ..RequestOptions::default()
        };
        self.send(Method::Post, url, Some(body), options).await
    }

    pub async fn patch<R: DeserializeOwned>(
        &self,
        url: &str,
        body: Value,
    ) -> Result<R, RequestError> {
        self.send(Method::Patch, url, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete<R: DeserializeOwned>(
        &self,
        url: &str,
        params: BTreeMap<String, String>,
    ) -> Result<R, RequestError> {
        let options = RequestOptions {
            params,
            ..RequestOptions::default()
        };
        self.send(Method::Delete, url, None, options).await
    }

    /// Issue one logical request and decode the successful body into `R`.
    pub async fn send<R: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<R, RequestError> {
        let response = self.send_raw(method, url, body, options).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// Issue one logical request and return the successful response as is.
    pub async fn send_raw(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        let request = self.enrich(method, url, body, options);
        let request_id = request.header(REQUEST_ID_HEADER).unwrap_or_default().to_owned();
        let mut token_retries: u32 = 0;

        loop {
            if self.is_disconnected() {
                return Err(RequestError::Disconnected);
            }

            debug!(
                %method,
                url = %request.url,
                request_id = %request_id,
                params = ?request.query.keys().collect::<Vec<_>>(),
                "api request"
            );

            let response = match self.transport.execute(&request).await {
                Ok(response) => response,
                Err(err) => {
                    let failures = self.record_failure();
                    warn!(
                        %method,
                        url = %request.url,
                        request_id = %request_id,
                        failures,
                        error = %err,
                        "api request failed without response"
                    );
                    return Err(err.into());
                }
            };

            debug!(
                %method,
                url = %request.url,
                request_id = %request_id,
                status = response.status,
                "api response"
            );

            if !is_error_response(&response) {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                return Ok(response);
            }

            let failures = self.record_failure();
            let err = ApiError::from_response(response);
            warn!(
                %method,
                url = %request.url,
                request_id = %request_id,
                failures,
                code = ?err.code,
                status = err.status,
                "api error: {}",
                err.message
            );

            if !err.is_token_expired() {
                return Err(err.into());
            }
            if !self.retry_policy.allows_token_retry(token_retries) {
                warn!(request_id = %request_id, token_retries, "token expiry retry cap reached");
                return Err(err.into());
            }

            token_retries += 1;
            if failures > 1 {
                let delay = self.retry_policy.delay_for_failures(failures);
                debug!(request_id = %request_id, delay_ms = delay.as_millis() as u64, "backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn record_failure(&self) -> u32 {
        self.consecutive_failures
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
    }

    fn enrich(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> HttpRequest {
        let RequestOptions {
            headers: call_headers,
            params: call_params,
        } = options;

        let mut query = BTreeMap::from([(API_KEY_PARAM.to_owned(), self.api_key.clone())]);
        query.extend(call_params);
        query.extend(self.base_options.params.clone());

        let mut headers = BTreeMap::from([(CLIENT_IDENTITY_HEADER.to_owned(), self.user_agent())]);
        headers.extend(
            call_headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );
        headers.extend(
            self.base_options
                .headers
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.clone())),
        );
        headers
            .entry(REQUEST_ID_HEADER.to_owned())
            .or_insert_with(|| Uuid::new_v4().to_string());

        HttpRequest {
            method,
            url: url.to_owned(),
            query,
            headers,
            body: request_body(method, body),
        }
    }
}

fn request_body(method: Method, body: Option<Value>) -> RequestBody {
    let Some(body) = body.filter(|_| method.has_body()) else {
        return RequestBody::Empty;
    };
    if method != Method::PostForm {
        return RequestBody::Json(body);
    }

    let fields = match body {
        Value::Object(fields) => fields
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(text) => (name, text),
                other => (name, other.to_string()),
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    RequestBody::Form(fields)
}
