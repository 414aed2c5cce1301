// ── Connection status types ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use alarmwire_api::TransportKind;

/// Coarse status shown to consumers. The connection manager's internal
/// phases map onto these four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Why a connection attempt or session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FailureKind {
    /// Recoverable; retried with backoff.
    TransportError,
    /// Recoverable; retried with backoff.
    Timeout,
    /// Recoverable unless the server marked the close as intentional.
    ServerInitiatedDisconnect,
    /// Fatal until an explicit `connect()`.
    MaxRetriesExceeded,
}

/// Value object created on every connection state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub status: ConnectionState,
    pub tenant_id: Option<i64>,
    pub socket_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// Retry attempt the manager is on (0 once connected).
    pub attempt: u32,
    #[serde(skip)]
    pub transport: Option<TransportKind>,
}

impl ConnectionStatus {
    pub fn new(status: ConnectionState, tenant_id: Option<i64>) -> Self {
        Self {
            status,
            tenant_id,
            socket_id: None,
            timestamp: Utc::now(),
            error: None,
            failure: None,
            attempt: 0,
            transport: None,
        }
    }

    /// Initial value before anything happened.
    pub fn disconnected(tenant_id: Option<i64>) -> Self {
        Self::new(ConnectionState::Disconnected, tenant_id)
    }

    pub fn with_failure(mut self, failure: FailureKind, error: impl Into<String>) -> Self {
        self.failure = Some(failure);
        self.error = Some(error.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionState::Connected
    }
}
