//! `Transport` backed by a shared `reqwest::Client`.
//!
//! Connection pooling, TLS and redirects are left to reqwest. A per-request
//! timeout overrides the client-wide default.

use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::request::{OutboundRequest, TransportResponse};
use crate::{SendFuture, Transport};

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with `timeout` as its default request timeout.
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("building http client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shares its connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn send(&self, request: OutboundRequest) -> SendFuture<'_> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method.to_reqwest(), &request.url)
                .headers(request.headers);
            if let Some(query) = &request.query {
                builder = builder.query(query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            debug!(status, bytes = body.len(), "transport exchange complete");
            Ok::<_, TransportError>(TransportResponse { status, body })
        })
    }
}
