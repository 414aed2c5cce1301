// ── Core error types ──
//
// User-facing errors from alarmwire-core. Consumers never see raw HTTP or
// frame-decoding failures; `From<alarmwire_api::Error>` translates them.
// Connection failures are reported through `ConnectionStatus`; `ConnectError`
// is only what an awaiting `connect()` caller receives.

use thiserror::Error;

use crate::model::{FailureKind, OccurrenceId};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to alarm server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Push channel is not connected")]
    NotConnected,

    #[error("Alarm server timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Alarm occurrence not found: {occurrence_id}")]
    OccurrenceNotFound { occurrence_id: OccurrenceId },

    #[error("Rejected alarm payload: {message}")]
    InvalidPayload { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Alarm monitor is already running")]
    AlreadyInitialized,

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<alarmwire_api::Error> for CoreError {
    fn from(err: alarmwire_api::Error) -> Self {
        match err {
            alarmwire_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            alarmwire_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            alarmwire_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            alarmwire_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            alarmwire_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            alarmwire_api::Error::Api { status: 401, message } => {
                CoreError::AuthenticationFailed { message }
            }
            alarmwire_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            alarmwire_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            alarmwire_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            alarmwire_api::Error::UnknownEvent(name) => CoreError::InvalidPayload {
                message: format!("unknown push event '{name}'"),
            },
            alarmwire_api::Error::NotConnected => CoreError::NotConnected,
            alarmwire_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidPayload { message }
            }
        }
    }
}

// ── ConnectError ─────────────────────────────────────────────────────

/// Outcome of one connect attempt, shared by every caller awaiting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("push transport error: {0}")]
    Transport(String),

    #[error("connect attempt timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("giving up after {attempts} failed attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: String },

    #[error("no usable push endpoint: {0}")]
    InvalidEndpoint(String),

    /// The attempt was abandoned by `disconnect()`.
    #[error("connect attempt cancelled")]
    Cancelled,
}

impl ConnectError {
    /// Failure kind reported on the status channel, if this is a failure
    /// rather than a cancellation.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Transport(_) | Self::InvalidEndpoint(_) => Some(FailureKind::TransportError),
            Self::Timeout { .. } => Some(FailureKind::Timeout),
            Self::MaxRetriesExceeded { .. } => Some(FailureKind::MaxRetriesExceeded),
            Self::Cancelled => None,
        }
    }
}

impl From<alarmwire_api::Error> for ConnectError {
    fn from(err: alarmwire_api::Error) -> Self {
        match err {
            alarmwire_api::Error::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<ConnectError> for CoreError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ConnectError::InvalidEndpoint(message) => CoreError::Config { message },
            ConnectError::Cancelled => CoreError::NotConnected,
            other => CoreError::ConnectionFailed {
                url: String::new(),
                reason: other.to_string(),
            },
        }
    }
}
