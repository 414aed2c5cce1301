// ── Live alarm counters ──
//
// Process-wide running totals backed by a `watch` channel. All mutation
// goes through `send_modify`, which is where the floor and the
// `critical_total <= active_total` bound are enforced.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::model::{AlarmEvent, Severity};

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlarmCountSnapshot {
    pub active_total: u64,
    /// High plus critical.
    pub critical_total: u64,
}

impl AlarmCountSnapshot {
    /// Count open alarms by severity.
    pub fn classify<'a>(alarms: impl IntoIterator<Item = &'a AlarmEvent>) -> Self {
        alarms
            .into_iter()
            .filter(|a| a.state.is_open())
            .fold(Self::default(), |mut acc, alarm| {
                acc.active_total += 1;
                if alarm.is_critical() {
                    acc.critical_total += 1;
                }
                acc
            })
    }
}

/// Owner of the alarm counters.
#[derive(Debug)]
pub struct AlarmCountAggregate {
    tx: watch::Sender<AlarmCountSnapshot>,
}

impl Default for AlarmCountAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmCountAggregate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AlarmCountSnapshot::default());
        Self { tx }
    }

    /// Replace both counters, e.g. after a snapshot re-fetch.
    pub fn set_absolute(&self, active_total: u64, critical_total: u64) {
        self.tx.send_modify(|c| {
            c.active_total = active_total;
            c.critical_total = critical_total.min(active_total);
        });
        debug!(active_total, critical_total, "alarm counts reset");
    }

    /// Count one more open alarm.
    pub fn increment(&self, severity: Severity) {
        self.tx.send_modify(|c| {
            c.active_total = c.active_total.saturating_add(1);
            if severity.is_critical() {
                c.critical_total = c.critical_total.saturating_add(1);
            }
        });
    }

    /// Count one fewer open alarm. Never goes below zero.
    pub fn decrement(&self, severity: Severity) {
        self.tx.send_modify(|c| {
            c.active_total = c.active_total.saturating_sub(1);
            if severity.is_critical() {
                c.critical_total = c.critical_total.saturating_sub(1);
            }
            c.critical_total = c.critical_total.min(c.active_total);
        });
    }

    pub fn snapshot(&self) -> AlarmCountSnapshot {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AlarmCountSnapshot> {
        self.tx.subscribe()
    }
}
