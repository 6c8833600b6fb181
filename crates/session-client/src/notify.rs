//! User-feedback hooks
//!
//! The client does not render anything itself. It reports caller-visible
//! failures and session events to a `Notifier`, which an application wires to
//! its modal/toast layer and login redirect.

use tracing::{debug, info, warn};

use crate::config::ErrorMode;
use crate::replay::ReplayReport;

/// Receiver of user-facing events.
pub trait Notifier: Send + Sync {
    /// A transport or business error reached a caller.
    ///
    /// Transport errors with `ErrorMode::Hidden` are not forwarded here.
    fn notify(&self, mode: ErrorMode, message: &str);

    /// A refresh succeeded and its queued requests have all settled.
    fn refresh_completed(&self, _report: &ReplayReport) {}

    /// The session cannot be recovered without re-authentication.
    fn session_expired(&self) {}
}

/// Default notifier that only writes structured logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, mode: ErrorMode, message: &str) {
        match mode {
            ErrorMode::Modal | ErrorMode::Toast => warn!(?mode, message, "request failed"),
            ErrorMode::Hidden => debug!(message, "request failed (hidden)"),
        }
    }

    fn refresh_completed(&self, report: &ReplayReport) {
        info!(
            replayed = report.total(),
            failed = report.failed,
            "token refresh completed"
        );
    }

    fn session_expired(&self) {
        warn!("session expired, re-authentication required");
    }
}
