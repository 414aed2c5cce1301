// ── Notification sink ──
//
// Side effects (sound, popup, terminal bell) live outside core. The monitor
// decides *when* to notify; a sink decides *how*.

use crate::model::{Acknowledgment, AlarmEvent, ConnectionStatus};

/// Receives notification triggers from the monitor.
///
/// `alarm_raised` fires once per newly seen open occurrence, never for
/// re-deliveries or state updates of an occurrence already counted.
/// Every method defaults to a no-op.
pub trait NotificationSink: Send + Sync + 'static {
    fn alarm_raised(&self, _alarm: &AlarmEvent) {}

    fn alarm_acknowledged(&self, _ack: &Acknowledgment) {}

    fn connection_changed(&self, _status: &ConnectionStatus) {}
}
