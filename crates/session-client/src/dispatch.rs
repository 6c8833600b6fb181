//! Single-request pipeline: decorate, send, classify
//!
//! The dispatcher knows nothing about queues or refreshes. It attaches the
//! current credential, sends, classifies, and reports which credential
//! generation the request carried. `resolve` then decides, per request kind,
//! whether an expired classification may enter the refresh queue.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use credential::CredentialStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};
use transport::{OutboundRequest, RequestSpec, Transport, decorate};

use crate::classify::{Classification, Classifier};
use crate::config::{CallOptions, ClientConfig};
use crate::error::{Error, Result};

/// Why a request is being dispatched.
///
/// Only `Normal` requests may be queued on credential expiry. The refresh
/// call must not wait on itself, and a replay that is still rejected is a
/// real failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Normal,
    RefreshCall,
    Replay,
}

impl RequestKind {
    pub fn may_queue(self) -> bool {
        matches!(self, RequestKind::Normal)
    }
}

/// What to do with a classified response.
#[derive(Debug, PartialEq)]
pub enum Resolution {
    Settled(Result<Value>),
    /// Needs a refresh before it can complete.
    Expired,
}

/// Apply the queueing exemption to a classification.
pub fn resolve(classification: Classification, kind: RequestKind) -> Resolution {
    match classification {
        Classification::Success(value) => Resolution::Settled(Ok(value)),
        Classification::Business { code, message } => {
            Resolution::Settled(Err(Error::Business { code, message }))
        }
        Classification::CredentialExpired if kind.may_queue() => Resolution::Expired,
        Classification::CredentialExpired => {
            debug!(?kind, "credential rejected on exempt request, not queueing");
            Resolution::Settled(Err(Error::SessionExpired))
        }
    }
}

/// A classified response and the credential generation it was sent with.
#[derive(Debug)]
pub(crate) struct Dispatched {
    pub classification: Classification,
    pub generation: u64,
}

struct Settings {
    base_url: String,
    timeout: Duration,
}

pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    classifier: Classifier,
    settings: RwLock<Settings>,
    content_type: String,
    logging_enabled: bool,
}

impl Dispatcher {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            transport,
            store,
            classifier: Classifier::from_config(config),
            settings: RwLock::new(Settings {
                base_url: config.base_url.clone(),
                timeout: config.timeout(),
            }),
            content_type: config.content_type.clone(),
            logging_enabled: config.logging_enabled,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn set_base_url(&self, base_url: String) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .base_url = base_url;
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .timeout = timeout;
    }

    pub fn base_url(&self) -> String {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .base_url
            .clone()
    }

    /// Send one request with the current credential and classify the reply.
    pub async fn dispatch(
        &self,
        spec: &RequestSpec,
        options: &CallOptions,
        kind: RequestKind,
    ) -> Result<Dispatched> {
        let (credential, generation) = self.store.snapshot();
        let (base_url, default_timeout) = {
            let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
            (settings.base_url.clone(), settings.timeout)
        };

        let request = OutboundRequest {
            method: spec.method,
            url: spec.url(&base_url),
            query: spec.query.clone(),
            body: spec.body.clone(),
            headers: decorate(&self.content_type, credential.access_token(), &spec.headers),
            timeout: Some(options.timeout().unwrap_or(default_timeout)),
        };

        if self.logging_enabled {
            info!(method = %spec.method, path = %spec.path, ?kind, generation, "request sent");
        }
        let started = Instant::now();

        let response = self.transport.send(request).await.inspect_err(|e| {
            debug!(method = %spec.method, path = %spec.path, error = %e, "transport failure");
        })?;

        if self.logging_enabled {
            info!(
                method = %spec.method,
                path = %spec.path,
                status = response.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "response received"
            );
        }

        let classification = self.classifier.classify(&response, options)?;
        Ok(Dispatched {
            classification,
            generation,
        })
    }

    /// Dispatch a request that is exempt from queueing and settle it.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        options: &CallOptions,
        kind: RequestKind,
    ) -> Result<Value> {
        let dispatched = self.dispatch(spec, options, kind).await?;
        match resolve(dispatched.classification, kind) {
            Resolution::Settled(result) => result,
            Resolution::Expired => Err(Error::SessionExpired),
        }
    }
}
