//! HTTP client with transparent access-token refresh
//!
//! Callers issue ordinary requests. When the backend reports that the access
//! token expired, the client runs a single refresh, parks every request that
//! hits the expiry (or arrives) while it runs, and replays them with the new
//! token once it lands. If the refresh fails, every parked caller receives
//! `Error::SessionExpired`.

pub mod classify;
pub mod client;
pub mod config;
pub mod coordinator;
mod dispatch;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod refresh;
pub mod replay;

#[cfg(test)]
mod testing;

pub use classify::{Classification, Classifier};
pub use client::{HttpClient, HttpClientBuilder};
pub use config::{CallOptions, ClientConfig, ErrorMode};
pub use coordinator::{Phase, QueuedRequest};
pub use dispatch::{RequestKind, Resolution, resolve};
pub use error::{Error, Result};
pub use notify::{LogNotifier, Notifier};
pub use refresh::{EndpointRefresher, FnRefresher, RefreshHandler, RefreshSession, refresh_fn};
pub use replay::ReplayReport;

pub use credential::{Credential, CredentialStore};
pub use transport::{Method, RequestSpec, Transport, TransportError};
