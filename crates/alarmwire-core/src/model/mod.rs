// ── Domain model ──
//
// Canonical alarm, acknowledgment and connection types. Wire payloads from
// `alarmwire_api` are converted into these in `crate::convert`.

pub mod alarm;
pub mod connection;
pub mod diagnostic;

pub use alarm::{Acknowledgment, AlarmEvent, AlarmState, OccurrenceId, Severity, TriggerValue};
pub use connection::{ConnectionState, ConnectionStatus, FailureKind};
pub use diagnostic::{ErrorEvent, ErrorKind};
