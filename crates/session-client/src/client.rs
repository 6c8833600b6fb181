//! Client facade
//!
//! Request lifecycle:
//! 1. If a refresh is running, park the request (fast path).
//! 2. Otherwise decorate and send it with the current credential.
//! 3. Classify the response. Success and business errors settle immediately.
//! 4. An expired response goes to the coordinator, which either queues it,
//!    starts a refresh with it at the head of the queue, replays it directly
//!    (the credential already rotated) or refuses it (cooldown).
//!
//! The refresh itself runs on its own task. Callers only ever await their own
//! outcome channel, so dropping a caller future never cancels a refresh.

use std::sync::Arc;
use std::time::Duration;

use credential::{Credential, CredentialStore};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use transport::{Method, ReqwestTransport, RequestSpec, Transport};

use crate::config::{CallOptions, ClientConfig, ErrorMode};
use crate::coordinator::{self, Admission, Coordinator, ExpiryDecision, Phase, QueuedRequest};
use crate::dispatch::{Dispatcher, RequestKind, Resolution, resolve};
use crate::error::{Error, Result};
use crate::metrics;
use crate::notify::{LogNotifier, Notifier};
use crate::refresh::{EndpointRefresher, RefreshHandler, RefreshSession};
use crate::replay;

/// HTTP client that keeps its session alive across access-token expiry.
///
/// Cheap to clone; clones share the credential, queue and refresh state.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    dispatcher: Arc<Dispatcher>,
    coordinator: Coordinator,
    refresher: Arc<dyn RefreshHandler>,
    notifier: Arc<dyn Notifier>,
    refresh_timeout: Option<Duration>,
}

/// Builder for `HttpClient`.
pub struct HttpClientBuilder {
    config: ClientConfig,
    store: Option<Arc<CredentialStore>>,
    transport: Option<Arc<dyn Transport>>,
    refresher: Option<Arc<dyn RefreshHandler>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl HttpClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            store: None,
            transport: None,
            refresher: None,
            notifier: None,
        }
    }

    /// Start from an in-memory credential.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.store = Some(Arc::new(CredentialStore::new(credential)));
        self
    }

    /// Share an existing (possibly file-backed) store.
    pub fn store(mut self, store: Arc<CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the default endpoint refresher.
    pub fn refresher(mut self, refresher: impl RefreshHandler + 'static) -> Self {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let store = self
            .store
            .ok_or_else(|| Error::InvalidRequest("no credential configured".into()))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.timeout())?),
        };
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(EndpointRefresher::new(
                self.config.refresh_endpoint_path.clone(),
            ))
        });
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));

        info!(
            base_url = %self.config.base_url,
            transport = transport.id(),
            timeout_ms = self.config.timeout_ms,
            cooldown_ms = self.config.cooldown_ms,
            persisted = store.path().is_some(),
            "http client initialized"
        );

        let dispatcher = Arc::new(Dispatcher::new(&self.config, transport, store));
        Ok(HttpClient {
            inner: Arc::new(Inner {
                dispatcher,
                coordinator: Coordinator::new(self.config.cooldown()),
                refresher,
                notifier,
                refresh_timeout: self.config.refresh_timeout(),
            }),
        })
    }
}

impl HttpClient {
    /// Client over the default transport and refresher.
    pub fn new(config: ClientConfig, credential: Credential) -> Result<Self> {
        Self::builder(config).credential(credential).build()
    }

    pub fn builder(config: ClientConfig) -> HttpClientBuilder {
        HttpClientBuilder::new(config)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<Value>,
        options: CallOptions,
    ) -> Result<T> {
        let mut spec = RequestSpec::new(Method::Get, path);
        spec.query = params;
        self.send(spec, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<Value>,
        options: CallOptions,
    ) -> Result<T> {
        let mut spec = RequestSpec::new(Method::Delete, path);
        spec.query = params;
        self.send(spec, options).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
        options: CallOptions,
    ) -> Result<T> {
        let mut spec = RequestSpec::new(Method::Post, path);
        spec.body = body;
        self.send(spec, options).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
        options: CallOptions,
    ) -> Result<T> {
        let mut spec = RequestSpec::new(Method::Put, path);
        spec.body = body;
        self.send(spec, options).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
        options: CallOptions,
    ) -> Result<T> {
        let mut spec = RequestSpec::new(Method::Patch, path);
        spec.body = body;
        self.send(spec, options).await
    }

    /// Issue a request and decode its payload into `T`.
    ///
    /// Resolves exactly once: with the payload, a transport or business error,
    /// `SessionExpired`, or `InstanceDestroyed`.
    #[instrument(skip_all, fields(method = %spec.method, path = %spec.path))]
    pub async fn send<T: DeserializeOwned>(
        &self,
        spec: RequestSpec,
        options: CallOptions,
    ) -> Result<T> {
        if spec.path.is_empty() {
            return Err(Error::InvalidRequest("empty path".into()));
        }
        let method = spec.method;
        let mode = options.error_mode;

        let result = self.inner.run(spec, options).await.and_then(|value| {
            serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
        });
        match &result {
            Ok(_) => metrics::record_request(method, "success"),
            Err(e) => {
                metrics::record_request(method, e.kind());
                self.inner.report(e, mode);
            }
        }
        result
    }

    /// Reject every queued request with `InstanceDestroyed`, stop any running
    /// refresh and reset the coordinator. Returns how many were rejected.
    ///
    /// The client stays usable afterwards; later calls start from `Idle`.
    pub fn destroy(&self) -> usize {
        self.inner.coordinator.destroy()
    }

    pub fn phase(&self) -> Phase {
        self.inner.coordinator.phase()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.coordinator.pending_len()
    }

    pub fn pending_requests(&self) -> Vec<QueuedRequest> {
        self.inner.coordinator.pending()
    }

    pub fn credential(&self) -> Credential {
        self.inner.dispatcher.store().get()
    }

    /// Install a credential obtained elsewhere (e.g. a fresh login).
    ///
    /// Requests already in flight with the old token that come back expired
    /// are replayed with this one instead of triggering a refresh.
    pub async fn set_credential(&self, credential: Credential) -> Result<()> {
        let store = self.inner.dispatcher.store();
        store.set(credential);
        store.save().await.inspect_err(|e| {
            warn!(error = %e, "failed to persist credential");
        })?;
        Ok(())
    }

    pub fn set_base_url(&self, base_url: impl Into<String>) {
        self.inner.dispatcher.set_base_url(base_url.into());
    }

    pub fn base_url(&self) -> String {
        self.inner.dispatcher.base_url()
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.dispatcher.set_timeout(timeout);
    }
}

impl Inner {
    async fn run(self: &Arc<Self>, spec: RequestSpec, options: CallOptions) -> Result<Value> {
        if let Admission::Queued(outcome) = self.coordinator.admit(&spec, &options) {
            return coordinator::wait(outcome).await;
        }

        let dispatched = self
            .dispatcher
            .dispatch(&spec, &options, RequestKind::Normal)
            .await?;
        match resolve(dispatched.classification, RequestKind::Normal) {
            Resolution::Settled(result) => result,
            Resolution::Expired => self.on_expired(spec, options, dispatched.generation).await,
        }
    }

    async fn on_expired(
        self: &Arc<Self>,
        spec: RequestSpec,
        options: CallOptions,
        generation: u64,
    ) -> Result<Value> {
        let store = self.dispatcher.store();
        match self.coordinator.on_expired(&spec, &options, generation, store) {
            ExpiryDecision::Queued(outcome) => coordinator::wait(outcome).await,
            ExpiryDecision::Lead { epoch, outcome } => {
                self.spawn_refresh(epoch);
                coordinator::wait(outcome).await
            }
            ExpiryDecision::Stale => {
                self.dispatcher
                    .execute(&spec, &options, RequestKind::Replay)
                    .await
            }
            ExpiryDecision::Cooldown => {
                warn!(path = %spec.path, "credential expired again within cooldown, not refreshing");
                metrics::record_refresh("cooldown");
                self.notifier.session_expired();
                Err(Error::SessionExpired)
            }
        }
    }

    /// Start the driver, plus a watcher that fails the epoch if the driver
    /// panics. An abort from `destroy` is left alone.
    fn spawn_refresh(self: &Arc<Self>, epoch: u64) {
        let inner = Arc::clone(self);
        let driver = tokio::spawn(async move { inner.drive_refresh(epoch).await });
        self.coordinator.attach_driver(epoch, driver.abort_handle());

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = driver.await
                && e.is_panic()
            {
                inner.refresh_failed(epoch, &Error::Refresh("refresh handler panicked".into()));
            }
        });
    }

    async fn drive_refresh(self: Arc<Self>, epoch: u64) {
        let session = RefreshSession::new(&self.dispatcher, self.dispatcher.store().get());
        let attempt = self.refresher.refresh(session);
        let result = match self.refresh_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Refresh(format!(
                        "no response within {}ms",
                        limit.as_millis()
                    )))
                }),
            None => attempt.await,
        };

        match result {
            Ok(credential) => self.refresh_succeeded(epoch, credential).await,
            Err(e) => self.refresh_failed(epoch, &e),
        }
    }

    async fn refresh_succeeded(&self, epoch: u64, credential: Credential) {
        let store = self.dispatcher.store();
        let Some(batch) = self.coordinator.complete(epoch, store, credential) else {
            debug!(epoch, "refresh superseded, discarding new credential");
            return;
        };
        metrics::record_refresh("success");

        if let Err(e) = store.save().await {
            warn!(error = %e, "failed to persist refreshed credential");
        }

        info!(epoch, queued = batch.len(), "credential refreshed, replaying queued requests");
        let report = replay::replay_batch(Arc::clone(&self.dispatcher), batch).await;
        info!(
            epoch,
            succeeded = report.succeeded,
            failed = report.failed,
            "replay finished"
        );
        self.notifier.refresh_completed(&report);
    }

    fn refresh_failed(&self, epoch: u64, error: &Error) {
        let Some(batch) = self.coordinator.fail(epoch) else {
            debug!(epoch, error = %error, "superseded refresh failed");
            return;
        };
        metrics::record_refresh("failure");

        let rejected = batch.len();
        for pending in batch {
            pending.settle(Err(Error::SessionExpired));
        }
        warn!(epoch, rejected, error = %error, "credential refresh failed, session expired");
        self.notifier.session_expired();
    }

    /// Forward a caller-visible error to the notifier.
    fn report(&self, error: &Error, mode: ErrorMode) {
        match error {
            Error::Transport(_) if mode == ErrorMode::Hidden => {
                debug!(error = %error, "transport error suppressed");
            }
            Error::Transport(_) | Error::Business { .. } => {
                self.notifier.notify(mode, &error.to_string());
            }
            _ => {}
        }
    }
}
