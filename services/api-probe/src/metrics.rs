//! Prometheus metrics exposition
//!
//! The client crate records its counters through the `metrics` facade; this
//! module only installs the recorder that collects them:
//!
//! - `session_client_requests_total` (counter): labels `method`, `outcome`
//! - `session_client_refresh_total` (counter): label `outcome`
//! - `session_client_queued_total` (counter): label `path`
//! - `session_client_replay_total` (counter): label `outcome`

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
