//! Command-line flags

use clap::Parser;
use serde_json::Value;
use session_client::{CallOptions, ErrorMode};
use transport::{Method, RequestSpec};

#[derive(Parser, Debug)]
#[command(name = "api-probe")]
#[command(about = "Issue one request through the session client and print the payload")]
#[command(version)]
pub struct Args {
    /// Config file (falls back to CONFIG_PATH, then session-client.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// HTTP method, case-insensitive
    #[arg(short, long, default_value = "GET")]
    pub method: Method,

    #[arg(short, long, default_value = "/")]
    pub path: String,

    /// JSON payload. Sent as the query string for GET and DELETE.
    #[arg(short, long, value_name = "JSON")]
    pub body: Option<Value>,

    /// Return the whole response envelope instead of its `data` field
    #[arg(long)]
    pub native: bool,

    /// Keep transport errors out of the notifier
    #[arg(long)]
    pub hidden: bool,

    /// Print Prometheus metrics after the request
    #[arg(long)]
    pub metrics: bool,
}

impl Args {
    pub fn request_spec(&self) -> RequestSpec {
        let spec = RequestSpec::new(self.method, self.path.clone());
        match (&self.body, self.method) {
            (None, _) => spec,
            (Some(params), Method::Get | Method::Delete) => spec.with_query(params.clone()),
            (Some(body), _) => spec.with_body(body.clone()),
        }
    }

    pub fn call_options(&self) -> CallOptions {
        let options = if self.native {
            CallOptions::native()
        } else {
            CallOptions::default()
        };
        if self.hidden {
            options.with_error_mode(ErrorMode::Hidden)
        } else {
            options
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(flags: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("api-probe").chain(flags.iter().copied()))
    }

    #[test]
    fn defaults_to_get_root() {
        let parsed = parse(&[]).unwrap();
        assert_eq!(parsed.method, Method::Get);
        assert!(parsed.config.is_none());
        assert!(!parsed.native && !parsed.hidden && !parsed.metrics);
        assert_eq!(parsed.request_spec(), RequestSpec::new(Method::Get, "/"));
    }

    #[test]
    fn parses_every_flag() {
        let parsed = parse(&[
            "--config",
            "/etc/probe.toml",
            "--method",
            "post",
            "--path",
            "/orders",
            "--body",
            r#"{"sku": 7}"#,
            "--native",
            "--hidden",
            "--metrics",
        ])
        .unwrap();

        assert_eq!(parsed.config.as_deref(), Some("/etc/probe.toml"));
        assert_eq!(parsed.method, Method::Post);
        assert_eq!(parsed.path, "/orders");
        assert_eq!(parsed.body, Some(json!({"sku": 7})));
        assert!(parsed.native && parsed.hidden && parsed.metrics);

        let options = parsed.call_options();
        assert!(options.return_native_data);
        assert_eq!(options.error_mode, ErrorMode::Hidden);

        let spec = parsed.request_spec();
        assert_eq!(spec.body, Some(json!({"sku": 7})));
        assert!(spec.query.is_none());
    }

    #[test]
    fn get_body_becomes_query() {
        let parsed = parse(&["-p", "/orders", "-b", r#"{"page": 2}"#]).unwrap();
        let spec = parsed.request_spec();
        assert_eq!(spec.query, Some(json!({"page": 2})));
        assert!(spec.body.is_none());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--method", "TRACE"]).is_err());
        assert!(parse(&["--body", "{not json"]).is_err());
        assert!(parse(&["--path"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
