//! Replay of queued requests after a successful refresh

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::coordinator::PendingRequest;
use crate::dispatch::{Dispatcher, RequestKind};
use crate::metrics;

/// Aggregate outcome of one replay batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl ReplayReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Re-dispatch every request in `batch` concurrently with the current
/// credential.
///
/// Each caller is settled as soon as its own replay finishes; the returned
/// report is only available once all of them have. Replays run on detached
/// tasks, so aborting the task awaiting this function does not strand callers.
pub(crate) async fn replay_batch(
    dispatcher: Arc<Dispatcher>,
    batch: Vec<PendingRequest>,
) -> ReplayReport {
    let handles: Vec<JoinHandle<bool>> = batch
        .into_iter()
        .map(|pending| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let outcome = dispatcher
                    .execute(&pending.spec, &pending.options, RequestKind::Replay)
                    .await;
                let succeeded = outcome.is_ok();
                if let Err(e) = &outcome {
                    debug!(id = %pending.id, path = %pending.spec.path, error = %e, "replay failed");
                }
                metrics::record_replay(succeeded);
                if !pending.settle(outcome) {
                    debug!("caller stopped waiting before replay settled");
                }
                succeeded
            })
        })
        .collect();

    let mut report = ReplayReport::default();
    for handle in handles {
        match handle.await {
            Ok(true) => report.succeeded += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                warn!(error = %e, "replay task did not complete");
                report.failed += 1;
            }
        }
    }
    report
}
