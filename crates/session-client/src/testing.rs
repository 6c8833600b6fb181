//! Scripted transport and recording notifier for scenario tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use transport::{OutboundRequest, SendFuture, Transport, TransportError, TransportResponse};

use crate::config::ErrorMode;
use crate::notify::Notifier;
use crate::replay::ReplayReport;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Routes that take this long before answering.
pub const SLOW_PREFIX: &str = "/slow";
pub const SLOW_DELAY: Duration = Duration::from_millis(100);

/// How the fake backend answers the refresh call.
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    Succeed {
        delay: Duration,
        access: &'static str,
        refresh: Option<&'static str>,
    },
    NetworkError {
        delay: Duration,
    },
    /// Answers with the expired envelope code.
    Expired,
    Hang,
}

impl RefreshBehavior {
    pub fn succeed_after(delay: Duration) -> Self {
        Self::Succeed {
            delay,
            access: "at_new",
            refresh: Some("rt_new"),
        }
    }
}

/// A record of one request as it reached the transport.
#[derive(Debug, Clone)]
pub struct Sent {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

struct Script {
    valid_token: String,
    refresh: RefreshBehavior,
    always_expired: HashSet<String>,
}

/// Fake backend that accepts exactly one access token at a time.
///
/// - `/auth/refresh` follows the configured `RefreshBehavior`; on success the
///   returned access token becomes the only valid one.
/// - Paths under `/slow` answer after `SLOW_DELAY`, checking the token at
///   answer time.
/// - `/business` answers with business code 20001.
/// - `/status/500` answers HTTP 500.
/// - Anything else echoes `{path, token}` for the valid token and the expired
///   code otherwise.
pub struct ScriptedTransport {
    script: Mutex<Script>,
    refresh_calls: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedTransport {
    pub fn new(valid_token: &str, refresh: RefreshBehavior) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                valid_token: valid_token.to_string(),
                refresh,
                always_expired: HashSet::new(),
            }),
            refresh_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Make `path` reject every token.
    pub fn always_expired(&self, path: &str) {
        self.script
            .lock()
            .unwrap()
            .always_expired
            .insert(path.to_string());
    }

    pub fn set_refresh(&self, behavior: RefreshBehavior) {
        self.script.lock().unwrap().refresh = behavior;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Authorization headers sent for `path`, in order.
    pub fn tokens_for(&self, path: &str) -> Vec<Option<String>> {
        self.sent()
            .into_iter()
            .filter(|s| s.path == path)
            .map(|s| s.authorization)
            .collect()
    }

    fn expired() -> TransportResponse {
        TransportResponse::json(200, &json!({"code": "14401", "data": null, "message": "token expired"}))
    }

    fn answer(&self, path: &str, authorization: Option<&str>) -> TransportResponse {
        let script = self.script.lock().unwrap();
        if script.always_expired.contains(path) {
            return Self::expired();
        }
        let token = authorization.and_then(|a| a.strip_prefix("Bearer "));
        if token != Some(script.valid_token.as_str()) {
            return Self::expired();
        }
        TransportResponse::json(
            200,
            &json!({"code": "0", "data": {"path": path, "token": token}, "message": "ok"}),
        )
    }

    async fn refresh(&self) -> transport::Result<TransportResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.script.lock().unwrap().refresh.clone();
        match behavior {
            RefreshBehavior::Succeed {
                delay,
                access,
                refresh,
            } => {
                tokio::time::sleep(delay).await;
                self.script.lock().unwrap().valid_token = access.to_string();
                Ok(TransportResponse::json(
                    200,
                    &json!({"code": "0", "data": {"accessToken": access, "refreshToken": refresh}}),
                ))
            }
            RefreshBehavior::NetworkError { delay } => {
                tokio::time::sleep(delay).await;
                Err(TransportError::Connect("connection reset by peer".into()))
            }
            RefreshBehavior::Expired => Ok(Self::expired()),
            RefreshBehavior::Hang => std::future::pending().await,
        }
    }
}

impl Transport for ScriptedTransport {
    fn id(&self) -> &str {
        "scripted"
    }

    fn send(&self, request: OutboundRequest) -> SendFuture<'_> {
        Box::pin(async move {
            let path = request.path().to_string();
            let authorization = request.authorization().map(str::to_owned);
            self.sent.lock().unwrap().push(Sent {
                path: path.clone(),
                authorization: authorization.clone(),
                body: request.body.clone(),
            });

            match path.as_str() {
                REFRESH_PATH => self.refresh().await,
                "/business" => Ok(TransportResponse::json(
                    200,
                    &json!({"code": "20001", "data": null, "message": "order not found"}),
                )),
                "/status/500" => Ok(TransportResponse::new(500, "")),
                p => {
                    if p.starts_with(SLOW_PREFIX) {
                        tokio::time::sleep(SLOW_DELAY).await;
                    }
                    Ok(self.answer(p, authorization.as_deref()))
                }
            }
        })
    }
}

/// Notifier that remembers everything it was told.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<(ErrorMode, String)>>,
    pub expired: AtomicUsize,
    pub reports: Mutex<Vec<ReplayReport>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(ErrorMode, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn expired_count(&self) -> usize {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> Vec<ReplayReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl Notifier for Arc<RecordingNotifier> {
    fn notify(&self, mode: ErrorMode, message: &str) {
        self.notices.lock().unwrap().push((mode, message.to_string()));
    }

    fn refresh_completed(&self, report: &ReplayReport) {
        self.reports.lock().unwrap().push(*report);
    }

    fn session_expired(&self) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }
}
