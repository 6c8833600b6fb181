//! Response classification
//!
//! Turns a completed exchange into success, business error or credential
//! expiry. Non-2xx statuses never reach envelope interpretation; they map onto
//! the fixed transport taxonomy instead.
//!
//! Envelope: `{"code": "...", "data": ..., "message": "..."}`. The code may be
//! a string or a number on the wire; both compare as strings.

use serde_json::Value;
use transport::{TransportError, TransportResponse};

use crate::config::{CallOptions, ClientConfig};
use crate::error::{Error, Result};

/// Outcome of inspecting one response.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success(Value),
    Business { code: String, message: String },
    CredentialExpired,
}

/// Sentinel codes and status policy used to classify responses.
#[derive(Debug, Clone)]
pub struct Classifier {
    success_code: String,
    expired_code: String,
    expire_on_unauthorized: bool,
}

impl Classifier {
    pub fn new(success_code: impl Into<String>, expired_code: impl Into<String>) -> Self {
        Self {
            success_code: success_code.into(),
            expired_code: expired_code.into(),
            expire_on_unauthorized: false,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            success_code: config.success_code.clone(),
            expired_code: config.expired_code.clone(),
            expire_on_unauthorized: config.expire_on_unauthorized,
        }
    }

    pub fn expire_on_unauthorized(mut self, enabled: bool) -> Self {
        self.expire_on_unauthorized = enabled;
        self
    }

    /// Classify a completed exchange.
    ///
    /// `Err` carries transport failures (non-2xx) and undecodable bodies.
    pub fn classify(
        &self,
        response: &TransportResponse,
        options: &CallOptions,
    ) -> Result<Classification> {
        if response.status == 401 && self.expire_on_unauthorized {
            return Ok(Classification::CredentialExpired);
        }
        if !response.is_success() {
            return Err(TransportError::from_status(response.status).into());
        }

        let body = match parse_body(&response.body) {
            Ok(body) => body,
            Err(_) if options.return_native_data => {
                let text = String::from_utf8_lossy(&response.body).into_owned();
                return Ok(Classification::Success(Value::String(text)));
            }
            Err(e) => return Err(Error::Decode(e.to_string())),
        };

        let Some(code) = envelope_code(&body) else {
            // Not an envelope; hand the body back as-is
            return Ok(Classification::Success(body));
        };

        if code == self.expired_code {
            return Ok(Classification::CredentialExpired);
        }
        if options.return_native_data {
            return Ok(Classification::Success(body));
        }
        if code == self.success_code {
            let data = body.get("data").cloned().unwrap_or(Value::Null);
            return Ok(Classification::Success(data));
        }

        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("unknown error")
            .to_string();
        Ok(Classification::Business { code, message })
    }
}

fn parse_body(bytes: &[u8]) -> serde_json::Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
}

fn envelope_code(body: &Value) -> Option<String> {
    match body.get("code")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> Classifier {
        Classifier::new("0", "14401")
    }

    fn ok(body: Value) -> TransportResponse {
        TransportResponse::json(200, &body)
    }

    #[test]
    fn success_code_unwraps_data() {
        let result = classifier()
            .classify(
                &ok(json!({"code": "0", "data": {"id": 1}, "message": "ok"})),
                &CallOptions::default(),
            )
            .unwrap();
        assert_eq!(result, Classification::Success(json!({"id": 1})));
    }

    #[test]
    fn success_without_data_is_null() {
        let result = classifier()
            .classify(&ok(json!({"code": "0"})), &CallOptions::default())
            .unwrap();
        assert_eq!(result, Classification::Success(Value::Null));
    }

    #[test]
    fn expired_code_is_credential_expired() {
        let result = classifier()
            .classify(
                &ok(json!({"code": "14401", "data": null, "message": "token expired"})),
                &CallOptions::default(),
            )
            .unwrap();
        assert_eq!(result, Classification::CredentialExpired);
    }

    #[test]
    fn numeric_codes_compare_as_strings() {
        let result = classifier()
            .classify(&ok(json!({"code": 14401})), &CallOptions::default())
            .unwrap();
        assert_eq!(result, Classification::CredentialExpired);

        let result = classifier()
            .classify(&ok(json!({"code": 0, "data": 5})), &CallOptions::default())
            .unwrap();
        assert_eq!(result, Classification::Success(json!(5)));
    }

    #[test]
    fn other_code_is_business_error_with_message() {
        let result = classifier()
            .classify(
                &ok(json!({"code": "20001", "data": null, "message": "order not found"})),
                &CallOptions::default(),
            )
            .unwrap();
        assert_eq!(
            result,
            Classification::Business {
                code: "20001".into(),
                message: "order not found".into()
            }
        );
    }

    #[test]
    fn business_error_without_message_gets_generic_text() {
        let result = classifier()
            .classify(&ok(json!({"code": "9"})), &CallOptions::default())
            .unwrap();
        assert_eq!(
            result,
            Classification::Business {
                code: "9".into(),
                message: "unknown error".into()
            }
        );
    }

    #[test]
    fn native_mode_returns_whole_body() {
        let body = json!({"code": "20001", "data": [1, 2], "message": "nope"});
        let result = classifier()
            .classify(&ok(body.clone()), &CallOptions::native())
            .unwrap();
        assert_eq!(result, Classification::Success(body));
    }

    #[test]
    fn native_mode_still_honors_expiry() {
        let result = classifier()
            .classify(&ok(json!({"code": "14401"})), &CallOptions::native())
            .unwrap();
        assert_eq!(result, Classification::CredentialExpired);
    }

    #[test]
    fn native_mode_passes_non_json_through() {
        let response = TransportResponse::new(200, "plain text");
        let result = classifier()
            .classify(&response, &CallOptions::native())
            .unwrap();
        assert_eq!(result, Classification::Success(json!("plain text")));
    }

    #[test]
    fn non_json_body_is_decode_error() {
        let response = TransportResponse::new(200, "<html>");
        let err = classifier()
            .classify(&response, &CallOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got: {err:?}");
    }

    #[test]
    fn body_without_code_passes_through() {
        let result = classifier()
            .classify(&ok(json!([1, 2, 3])), &CallOptions::default())
            .unwrap();
        assert_eq!(result, Classification::Success(json!([1, 2, 3])));
    }

    #[test]
    fn non_2xx_is_transport_error_even_with_envelope() {
        let response = TransportResponse::json(500, &json!({"code": "14401"}));
        let err = classifier()
            .classify(&response, &CallOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            Error::Transport(TransportError::Status {
                status: 500,
                message: "internal server error".into()
            })
        );
    }

    #[test]
    fn unauthorized_is_transport_error_by_default() {
        let response = TransportResponse::new(401, "");
        let err = classifier()
            .classify(&response, &CallOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Status { status: 401, .. })
        ));
    }

    #[test]
    fn unauthorized_can_signal_expiry() {
        let response = TransportResponse::new(401, "");
        let result = classifier()
            .expire_on_unauthorized(true)
            .classify(&response, &CallOptions::default())
            .unwrap();
        assert_eq!(result, Classification::CredentialExpired);
    }

    #[test]
    fn empty_success_body_is_null() {
        let response = TransportResponse::new(204, "");
        let result = classifier()
            .classify(&response, &CallOptions::default())
            .unwrap();
        assert_eq!(result, Classification::Success(Value::Null));
    }
}
