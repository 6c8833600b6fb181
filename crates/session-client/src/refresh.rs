//! Credential refresh strategies
//!
//! The coordinator decides *when* to refresh; a `RefreshHandler` decides
//! *how*. `EndpointRefresher` is the stock strategy: POST the refresh token to
//! a configured path and read the new pair out of the envelope. Applications
//! with a different flow plug in their own handler, or wrap an async closure
//! with `refresh_fn`.
//!
//! Whatever the handler sends through `RefreshSession::post` goes out as a
//! refresh call: it bypasses the queue, and an expired response fails the
//! refresh instead of waiting on it.

use std::future::Future;
use std::pin::Pin;

use credential::{Credential, RefreshRequest, TokenPair};
use serde_json::Value;
use transport::{Method, RequestSpec};

use crate::config::{CallOptions, DEFAULT_REFRESH_PATH, ErrorMode};
use crate::dispatch::{Dispatcher, RequestKind};
use crate::error::{Error, Result};

pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential>> + Send + 'a>>;

/// Obtains a new credential from the current one.
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility (`Arc<dyn RefreshHandler>`).
/// Any `Err` fails the refresh; every queued request then receives
/// `SessionExpired`.
pub trait RefreshHandler: Send + Sync {
    fn refresh<'a>(&'a self, session: RefreshSession<'a>) -> RefreshFuture<'a>;
}

/// What a handler may use while refreshing.
pub struct RefreshSession<'a> {
    dispatcher: &'a Dispatcher,
    credential: Credential,
}

impl<'a> RefreshSession<'a> {
    pub(crate) fn new(dispatcher: &'a Dispatcher, credential: Credential) -> Self {
        Self {
            dispatcher,
            credential,
        }
    }

    /// Credential in effect when the refresh started.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// POST through the client's own transport, exempt from queueing.
    ///
    /// Returns the unwrapped envelope `data`.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let spec = RequestSpec::new(Method::Post, path).with_body(body);
        let options = CallOptions::default().with_error_mode(ErrorMode::Hidden);
        self.dispatcher
            .execute(&spec, &options, RequestKind::RefreshCall)
            .await
    }
}

/// Refreshes by POSTing `{"refreshToken": ...}` to a fixed path.
#[derive(Debug, Clone)]
pub struct EndpointRefresher {
    path: String,
}

impl EndpointRefresher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Default for EndpointRefresher {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_PATH)
    }
}

impl RefreshHandler for EndpointRefresher {
    fn refresh<'a>(&'a self, session: RefreshSession<'a>) -> RefreshFuture<'a> {
        Box::pin(async move {
            let refresh_token = session
                .credential()
                .refresh_token()
                .ok_or_else(|| Error::Refresh("no refresh token held".into()))?;

            let body = serde_json::to_value(RefreshRequest { refresh_token })
                .map_err(|e| Error::Refresh(format!("encoding refresh request: {e}")))?;
            let data = session.post(&self.path, body).await?;

            let pair: TokenPair = serde_json::from_value(data)
                .map_err(|e| Error::Decode(format!("refresh response: {e}")))?;
            Ok::<_, Error>(pair.into_credential(session.credential()))
        })
    }
}

/// Handler backed by an async closure over the current credential.
pub struct FnRefresher<F>(F);

/// Wrap `f` as a `RefreshHandler`. The closure cannot reach the client's
/// transport; use a full handler when the refresh goes to the same API.
pub fn refresh_fn<F, Fut>(f: F) -> FnRefresher<F>
where
    F: Fn(Credential) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Credential>> + Send + 'static,
{
    FnRefresher(f)
}

impl<F, Fut> RefreshHandler for FnRefresher<F>
where
    F: Fn(Credential) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Credential>> + Send + 'static,
{
    fn refresh<'a>(&'a self, session: RefreshSession<'a>) -> RefreshFuture<'a> {
        Box::pin((self.0)(session.credential.clone()))
    }
}
