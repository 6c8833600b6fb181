//! Transport-level error taxonomy
//!
//! Non-2xx statuses and network failures map onto a fixed set of variants
//! with user-presentable messages.

/// Errors below the envelope layer: bad HTTP status or no response at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network request failed: {0}")]
    Connect(String),

    #[error("network request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Map a non-2xx status onto the fixed message table.
    pub fn from_status(status: u16) -> Self {
        let message = match status {
            500 => "internal server error",
            400 => "permission denied",
            401 => "login expired, please sign in again",
            _ => "unknown error",
        };
        Self::Status {
            status,
            message: message.to_string(),
        }
    }

    /// HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Timeout => "timeout",
            Self::Connect(_) => "connect",
            Self::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
