//! Transport seam for the session client
//!
//! Defines the `Transport` trait that decouples request coordination from the
//! HTTP engine. `ReqwestTransport` is the production implementation; tests
//! substitute scripted transports that implement the same trait.
//!
//! Also home to the request decorator, which turns a caller's header set and
//! the current access token into the headers actually sent.

pub mod decorate;
pub mod error;
pub mod request;
pub mod reqwest_transport;

pub use decorate::{DEFAULT_CONTENT_TYPE, decorate};
pub use error::{Result, TransportError};
pub use request::{Method, OutboundRequest, RequestSpec, TransportResponse};
pub use reqwest_transport::ReqwestTransport;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by `Transport::send`.
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + 'a>>;

/// Abstraction over the underlying HTTP engine.
///
/// Implementations only move bytes: a completed exchange with any status is
/// `Ok`, and only failures to obtain a response (timeout, DNS, reset) are
/// `Err`. Interpreting status codes and envelopes is the caller's job.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest", "scripted")
    fn id(&self) -> &str;

    fn send(&self, request: OutboundRequest) -> SendFuture<'_>;
}
