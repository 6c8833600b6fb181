//! Caller-visible error taxonomy
//!
//! Every failure reaches the caller as one of these values. Credential expiry
//! is absent: it is an internal classification that always ends
//! as a successful replay or `SessionExpired`.

use transport::TransportError;

/// Errors returned by the client facade.
///
/// `Clone` so one `SessionExpired` can be handed to every queued caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Non-2xx status or network failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 2xx response whose envelope code is neither success nor expiry.
    #[error("{message}")]
    Business { code: String, message: String },

    /// Refresh failed, was refused by the cooldown, or a replay was still
    /// rejected. Callers should send the user back through login.
    #[error("session expired, please re-authenticate")]
    SessionExpired,

    /// The client was destroyed while this request was queued.
    #[error("client instance destroyed")]
    InstanceDestroyed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed response: {0}")]
    Decode(String),

    /// Raised by refresh handlers; converted to `SessionExpired` before any
    /// caller sees it.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    /// Persisting the credential failed.
    #[error("credential storage: {0}")]
    Storage(String),
}

impl Error {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.kind(),
            Self::Business { .. } => "business",
            Self::SessionExpired => "session_expired",
            Self::InstanceDestroyed => "instance_destroyed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Decode(_) => "decode",
            Self::Refresh(_) => "refresh",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<credential::Error> for Error {
    fn from(e: credential::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_error_displays_server_message() {
        let err = Error::Business {
            code: "20001".into(),
            message: "order not found".into(),
        };
        assert_eq!(err.to_string(), "order not found");
        assert_eq!(err.kind(), "business");
    }

    #[test]
    fn transport_error_is_transparent() {
        let err: Error = TransportError::from_status(500).into();
        assert_eq!(err.to_string(), "internal server error");
        assert_eq!(err.kind(), "status");
    }

    #[test]
    fn session_expired_clones_compare_equal() {
        let err = Error::SessionExpired;
        assert_eq!(err.clone(), err);
        assert!(err.is_session_expired());
        assert!(!Error::InstanceDestroyed.is_session_expired());
    }
}
