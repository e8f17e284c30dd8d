use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::HttpResponse;

/// Error body returned by the service, possibly alongside a 2xx status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorEnvelope {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub more_info: Option<String>,
    #[serde(rename = "StatusCode", default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetails {
    pub code: i64,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl ApiErrorEnvelope {
    /// Typed view of an error body. Only a non-zero `code` with a `message`
    /// counts, and auxiliary fields must match their declared shapes.
    pub fn from_body(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        if !object.contains_key("code") || !object.contains_key("message") {
            return None;
        }
        serde_json::from_value::<Self>(body.clone())
            .ok()
            .filter(|envelope| envelope.code != 0)
    }
}

/// Non-zero application `code` read straight from a body, whatever shape
/// its other fields have.
pub fn error_code(body: &Value) -> Option<i64> {
    body.get("code")
        .and_then(Value::as_i64)
        .filter(|code| *code != 0)
}

/// `message` read straight from a body, when it is a string.
pub fn error_message(body: &Value) -> Option<&str> {
    body.get("message").and_then(Value::as_str)
}

/// Whether the response must be treated as a failed call: any non-2xx
/// status, or a 2xx body carrying a non-zero `code` and a `message`.
pub fn is_error_response(response: &HttpResponse) -> bool {
    !response.is_success_status()
        || (error_code(&response.body).is_some() && response.body.get("message").is_some())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse { status, body }
    }

    #[test]
    fn detects_envelope_on_success_status() {
        let body = json!({
            "code": 40,
            "message": "token expired",
            "more_info": "https://docs.example.org/errors",
            "StatusCode": 401,
            "duration": "0.01ms",
            "details": { "code": 40, "messages": ["jwt expired"] }
        });

        let envelope = ApiErrorEnvelope::from_body(&body).expect("envelope should parse");
        assert_eq!(envelope.code, 40);
        assert_eq!(envelope.status_code, Some(401));
        assert_eq!(
            envelope.details.map(|details| details.messages),
            Some(vec!["jwt expired".to_owned()])
        );
        assert!(is_error_response(&response(200, body)));
    }

    #[test]
    fn normal_payloads_are_not_errors() {
        assert!(!is_error_response(&response(200, json!({ "token": "abc" }))));
        assert!(!is_error_response(&response(201, Value::Null)));
        assert!(!is_error_response(&response(200, json!({ "code": "XYZ", "message": "hello" }))));
    }

    #[test]
    fn zero_code_is_not_an_envelope() {
        let body = json!({ "code": 0, "message": "ok" });
        assert_eq!(ApiErrorEnvelope::from_body(&body), None);
    }

    #[test]
    fn off_shape_fields_do_not_hide_the_code() {
        let body = json!({ "code": 40, "message": "token expired", "StatusCode": "401", "more_info": 7 });

        assert_eq!(ApiErrorEnvelope::from_body(&body), None);
        assert_eq!(error_code(&body), Some(40));
        assert_eq!(error_message(&body), Some("token expired"));
        assert!(is_error_response(&response(200, body)));
        assert_eq!(error_code(&json!({ "code": 40 })), Some(40));
        assert_eq!(error_code(&json!("Bad Gateway")), None);
    }

    #[test]
    fn non_success_status_is_an_error_without_envelope() {
        assert!(is_error_response(&response(502, json!("Bad Gateway"))));
    }
}
