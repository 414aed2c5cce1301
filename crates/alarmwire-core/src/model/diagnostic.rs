// ── Error-category payloads ──
//
// What the dispatcher delivers to error handlers. These are reports, not
// `Result` errors: nothing upstream is waiting on them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use super::alarm::OccurrenceId;
use super::connection::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    TransportError,
    Timeout,
    ServerInitiatedDisconnect,
    MaxRetriesExceeded,
    /// A consumer's handler returned an error or panicked.
    HandlerException,
    /// An inbound frame was rejected at decode or conversion.
    InvalidFrame,
    /// A channel join could not be sent.
    ChannelJoin,
    /// A snapshot fetch or user action failed.
    Action,
}

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::TransportError => Self::TransportError,
            FailureKind::Timeout => Self::Timeout,
            FailureKind::ServerInitiatedDisconnect => Self::ServerInitiatedDisconnect,
            FailureKind::MaxRetriesExceeded => Self::MaxRetriesExceeded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    pub occurrence_id: Option<OccurrenceId>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            occurrence_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_occurrence(mut self, occurrence_id: OccurrenceId) -> Self {
        self.occurrence_id = Some(occurrence_id);
        self
    }
}
