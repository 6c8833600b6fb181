//! Metric recording helpers
//!
//! - `session_client_requests_total` (counter): labels `method`, `outcome`
//! - `session_client_refresh_total` (counter): label `outcome` (success, failure, cooldown)
//! - `session_client_queued_total` (counter): label `path` (fast, slow)
//! - `session_client_replay_total` (counter): label `outcome` (success, failure)
//!
//! Without an installed recorder every call is a no-op.

use transport::Method;

/// Record the final outcome a caller received.
pub fn record_request(method: Method, outcome: &'static str) {
    metrics::counter!(
        "session_client_requests_total",
        "method" => method.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("session_client_refresh_total", "outcome" => outcome).increment(1);
}

/// `fast` when queued before dispatch, `slow` when queued after an expired response.
pub fn record_queued(path: &'static str) {
    metrics::counter!("session_client_queued_total", "path" => path).increment(1);
}

pub fn record_replay(succeeded: bool) {
    let outcome = if succeeded { "success" } else { "failure" };
    metrics::counter!("session_client_replay_total", "outcome" => outcome).increment(1);
}
