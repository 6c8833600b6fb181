//! Refresh coordination state machine
//!
//! Two phases, `Idle` and `Refreshing`. All transitions happen inside one
//! short critical section on a `std::sync::Mutex` that is never held across an
//! await, so the check of the phase and the switch to `Refreshing` cannot be
//! interleaved by another task or thread. That is what guarantees a single
//! refresh in flight.
//!
//! Transitions:
//! - Idle → Refreshing: an expired response arrives, the credential has not
//!   rotated since that request left, and the cooldown has elapsed. The
//!   triggering request becomes the first queue entry.
//! - Idle (cooldown active) → Idle: the triggering request is refused.
//! - Refreshing → Refreshing: requests arriving before dispatch (fast path) or
//!   with an expired response (slow path) are appended to the queue.
//! - Refreshing → Idle: the refresh settles; the queue is drained in one step
//!   and handed to the caller for replay or rejection.
//! - any → Idle: `destroy` rejects everything queued and resets the state.
//!
//! Each refresh carries an epoch. A driver whose epoch no longer matches (the
//! client was destroyed meanwhile) finds nothing to settle.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use credential::{Credential, CredentialStore};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use transport::RequestSpec;
use uuid::Uuid;

use crate::config::CallOptions;
use crate::error::{Error, Result};
use crate::metrics;

/// Coordinator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Refreshing,
}

/// A suspended caller awaiting the outcome of a refresh.
///
/// Owned by the queue until drained; settled exactly once.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: Uuid,
    pub spec: RequestSpec,
    pub options: CallOptions,
    pub enqueued_at: Instant,
    responder: oneshot::Sender<Result<Value>>,
}

/// Receiving half held by the suspended caller.
pub(crate) type Outcome = oneshot::Receiver<Result<Value>>;

impl PendingRequest {
    fn new(spec: RequestSpec, options: CallOptions) -> (Self, Outcome) {
        let (responder, receiver) = oneshot::channel();
        let pending = Self {
            id: Uuid::new_v4(),
            spec,
            options,
            enqueued_at: Instant::now(),
            responder,
        };
        (pending, receiver)
    }

    /// Deliver the terminal outcome. Returns false if the caller stopped waiting.
    pub fn settle(self, outcome: Result<Value>) -> bool {
        self.responder.send(outcome).is_ok()
    }

    pub fn view(&self) -> QueuedRequest {
        QueuedRequest {
            id: self.id,
            spec: self.spec.clone(),
            options: self.options.clone(),
            waited_ms: self.enqueued_at.elapsed().as_millis() as u64,
        }
    }
}

/// Inspectable copy of a queue entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedRequest {
    pub id: Uuid,
    pub spec: RequestSpec,
    pub options: CallOptions,
    pub waited_ms: u64,
}

/// Wait for a queued request's outcome.
///
/// A sender dropped without settling means the owner went away.
pub(crate) async fn wait(outcome: Outcome) -> Result<Value> {
    outcome.await.unwrap_or(Err(Error::InstanceDestroyed))
}

/// Result of the fast-path check before dispatch.
pub(crate) enum Admission {
    Proceed,
    Queued(Outcome),
}

/// What to do with a request whose response said the credential expired.
pub(crate) enum ExpiryDecision {
    /// A refresh is already running; wait for it.
    Queued(Outcome),
    /// This request started a refresh. The caller must spawn the driver.
    Lead { epoch: u64, outcome: Outcome },
    /// The credential rotated after this request left; replay it directly.
    Stale,
    /// Too soon after the previous attempt; fail the request.
    Cooldown,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    last_attempt: Option<Instant>,
    queue: Vec<PendingRequest>,
    epoch: u64,
    driver: Option<AbortHandle>,
}

/// Owner of the refresh phase and the pending queue.
#[derive(Debug)]
pub struct Coordinator {
    state: Mutex<State>,
    cooldown: Duration,
}

impl Coordinator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                phase: Phase::Idle,
                last_attempt: None,
                queue: Vec::new(),
                epoch: 0,
                driver: None,
            }),
            cooldown,
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn pending_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Queue contents in FIFO order.
    pub fn pending(&self) -> Vec<QueuedRequest> {
        self.lock().queue.iter().map(PendingRequest::view).collect()
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.lock().last_attempt
    }

    /// Fast path: park the request without dispatching if a refresh is running.
    pub(crate) fn admit(&self, spec: &RequestSpec, options: &CallOptions) -> Admission {
        let mut state = self.lock();
        if state.phase == Phase::Idle {
            return Admission::Proceed;
        }
        let (pending, outcome) = PendingRequest::new(spec.clone(), options.clone());
        debug!(id = %pending.id, path = %spec.path, "refresh in progress, queued before dispatch");
        state.queue.push(pending);
        metrics::record_queued("fast");
        Admission::Queued(outcome)
    }

    /// Slow path: decide what happens to a request that came back expired.
    ///
    /// `sent_generation` is the credential generation the request carried.
    pub(crate) fn on_expired(
        &self,
        spec: &RequestSpec,
        options: &CallOptions,
        sent_generation: u64,
        store: &CredentialStore,
    ) -> ExpiryDecision {
        let mut state = self.lock();

        if state.phase == Phase::Refreshing {
            let (pending, outcome) = PendingRequest::new(spec.clone(), options.clone());
            debug!(id = %pending.id, path = %spec.path, "expired during refresh, queued");
            state.queue.push(pending);
            metrics::record_queued("slow");
            return ExpiryDecision::Queued(outcome);
        }

        if store.generation() > sent_generation {
            debug!(path = %spec.path, sent_generation, "credential already rotated, replaying");
            return ExpiryDecision::Stale;
        }

        let now = Instant::now();
        if let Some(last) = state.last_attempt
            && now.duration_since(last) < self.cooldown
        {
            return ExpiryDecision::Cooldown;
        }

        state.phase = Phase::Refreshing;
        state.last_attempt = Some(now);
        state.epoch += 1;
        let epoch = state.epoch;

        let (pending, outcome) = PendingRequest::new(spec.clone(), options.clone());
        info!(epoch, trigger = %spec.path, "credential expired, starting refresh");
        state.queue.push(pending);
        ExpiryDecision::Lead { epoch, outcome }
    }

    /// Remember the running driver so `destroy` can stop it.
    pub(crate) fn attach_driver(&self, epoch: u64, handle: AbortHandle) {
        let mut state = self.lock();
        if state.epoch == epoch && state.phase == Phase::Refreshing {
            state.driver = Some(handle);
        }
    }

    /// Refresh succeeded: install the credential and drain the queue, atomically.
    ///
    /// Returns `None` if this epoch was superseded.
    pub(crate) fn complete(
        &self,
        epoch: u64,
        store: &CredentialStore,
        credential: Credential,
    ) -> Option<Vec<PendingRequest>> {
        let mut state = self.lock();
        if !Self::owns(&state, epoch) {
            return None;
        }
        let generation = store.set(credential);
        debug!(epoch, generation, "credential installed");
        Some(Self::drain(&mut state))
    }

    /// Refresh failed: drain the queue for rejection.
    pub(crate) fn fail(&self, epoch: u64) -> Option<Vec<PendingRequest>> {
        let mut state = self.lock();
        if !Self::owns(&state, epoch) {
            return None;
        }
        Some(Self::drain(&mut state))
    }

    /// Reject everything queued with `InstanceDestroyed` and reset.
    ///
    /// Idempotent. Returns how many requests were rejected.
    pub fn destroy(&self) -> usize {
        let batch = {
            let mut state = self.lock();
            if let Some(driver) = state.driver.take() {
                driver.abort();
            }
            state.phase = Phase::Idle;
            state.last_attempt = None;
            state.epoch += 1;
            std::mem::take(&mut state.queue)
        };

        let rejected = batch.len();
        for pending in batch {
            pending.settle(Err(Error::InstanceDestroyed));
        }
        if rejected > 0 {
            info!(rejected, "client destroyed, queued requests rejected");
        }
        rejected
    }

    fn owns(state: &State, epoch: u64) -> bool {
        state.epoch == epoch && state.phase == Phase::Refreshing
    }

    fn drain(state: &mut State) -> Vec<PendingRequest> {
        state.phase = Phase::Idle;
        state.driver = None;
        std::mem::take(&mut state.queue)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
