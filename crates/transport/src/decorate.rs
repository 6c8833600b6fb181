//! Request decoration
//!
//! Every outbound call carries a default `Content-Type`, the current bearer
//! token, and the caller's own headers. Caller headers win on conflict.
//! Invalid names or values are skipped with a warning; decoration never fails.

use std::collections::BTreeMap;
use std::str::FromStr;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Default `Content-Type` for JSON APIs.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Build the header set for one outbound call.
pub fn decorate(
    content_type: &str,
    access_token: &str,
    caller_headers: &BTreeMap<String, String>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    match HeaderValue::from_str(content_type) {
        Ok(v) => {
            headers.insert(CONTENT_TYPE, v);
        }
        Err(e) => warn!(error = %e, "skipping invalid default content type"),
    }

    match HeaderValue::from_str(&format!("Bearer {access_token}")) {
        Ok(mut v) => {
            v.set_sensitive(true);
            headers.insert(AUTHORIZATION, v);
        }
        Err(e) => warn!(error = %e, "access token is not a valid header value, sending without it"),
    }

    for (name, value) in caller_headers {
        let name = match HeaderName::from_str(name) {
            Ok(n) => n,
            Err(e) => {
                warn!(header = %name, error = %e, "skipping invalid header name");
                continue;
            }
        };
        let value = match HeaderValue::from_str(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(header = %name, error = %e, "skipping invalid header value");
                continue;
            }
        };
        headers.insert(name, value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn attaches_bearer_and_default_content_type() {
        let headers = decorate(DEFAULT_CONTENT_TYPE, "at_123", &BTreeMap::new());
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer at_123");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn caller_headers_win_on_conflict() {
        let headers = decorate(
            DEFAULT_CONTENT_TYPE,
            "at_123",
            &caller(&[
                ("content-type", "multipart/form-data"),
                ("Authorization", "Basic abc"),
            ]),
        );
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "multipart/form-data");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Basic abc");
    }

    #[test]
    fn extra_caller_headers_are_added() {
        let headers = decorate(DEFAULT_CONTENT_TYPE, "at", &caller(&[("x-trace-id", "t-1")]));
        assert_eq!(headers.get("x-trace-id").unwrap(), "t-1");
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn skips_invalid_header_name() {
        let headers = decorate(
            DEFAULT_CONTENT_TYPE,
            "at",
            &caller(&[("invalid header name", "v"), ("x-valid", "works")]),
        );
        assert!(headers.get("invalid header name").is_none());
        assert_eq!(headers.get("x-valid").unwrap(), "works");
    }

    #[test]
    fn token_with_newline_is_dropped_not_fatal() {
        let headers = decorate(DEFAULT_CONTENT_TYPE, "bad\ntoken", &BTreeMap::new());
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.get(CONTENT_TYPE).is_some());
    }

    #[test]
    fn authorization_is_marked_sensitive() {
        let headers = decorate(DEFAULT_CONTENT_TYPE, "at", &BTreeMap::new());
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }
}
