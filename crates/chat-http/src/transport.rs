use std::{collections::BTreeMap, fmt, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Request verbs supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    /// `POST` with a multipart form body.
    PostForm,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Whether requests with this verb carry a body.
    pub fn has_body(self) -> bool {
        matches!(self, Self::Put | Self::Post | Self::PostForm | Self::Patch)
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Put => reqwest::Method::PUT,
            Self::Post | Self::PostForm => reqwest::Method::POST,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::PostForm => "postForm",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Options => "options",
        };
        f.write_str(name)
    }
}

/// Outgoing request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(BTreeMap<String, String>),
}

/// Fully enriched request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: BTreeMap<String, String>,
    /// Header names are stored lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Response as received, before any application-level classification.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a string when not JSON.
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// No HTTP response was received.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Executes one HTTP exchange.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(3))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url)
            .query(&request.query);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(fields) => {
                let form = fields
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                        form.text(name.clone(), value.clone())
                    });
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        Ok(HttpResponse {
            status,
            body: parse_body(&bytes),
        })
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_write_verbs_carry_bodies() {
        assert!(Method::Post.has_body());
        assert!(Method::PostForm.has_body());
        assert!(!Method::Get.has_body());
        assert!(!Method::Options.has_body());
    }

    #[test]
    fn post_form_is_sent_as_post() {
        assert_eq!(Method::PostForm.as_reqwest(), reqwest::Method::POST);
        assert_eq!(Method::PostForm.to_string(), "postForm");
    }

    #[test]
    fn parses_json_text_and_empty_bodies() {
        assert_eq!(parse_body(b""), Value::Null);
        assert_eq!(parse_body(br#"{"ok":true}"#), json!({ "ok": true }));
        assert_eq!(parse_body(b"Bad Gateway"), json!("Bad Gateway"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = HttpRequest {
            method: Method::Get,
            url: "https://chat.example.org/ping".into(),
            query: BTreeMap::new(),
            headers: BTreeMap::from([("x-client-request-id".to_owned(), "abc".to_owned())]),
            body: RequestBody::Empty,
        };
        assert_eq!(request.header("X-Client-Request-Id"), Some("abc"));
    }
}
