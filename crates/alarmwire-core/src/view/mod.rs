// ── Paged alarm view ──
//
// The filtered, paginated window a dashboard is looking at, and the
// reconciler that merges the live stream into it.

mod filter;
mod reconciler;

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

use crate::model::AlarmEvent;

pub use filter::{AlarmFilter, SeverityFilter};
pub use reconciler::{PagedAlarmReconciler, Placement};

/// What happens to buffered off-page events when the filter changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingPolicy {
    /// Carry the buffer (and its count) forward until the next flush.
    #[default]
    Keep,
    /// Drop the buffer; it was collected under a different filter.
    Discard,
}

/// Tuning for the paged view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub page_size: usize,
    /// Capacity of the off-page FIFO; the oldest entry is dropped beyond it.
    pub pending_capacity: usize,
    /// How long a fresh row stays flagged `is_new`.
    pub highlight_duration: Duration,
    pub pending_policy: PendingPolicy,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            pending_capacity: 10,
            highlight_duration: Duration::from_secs(5),
            pending_policy: PendingPolicy::Keep,
        }
    }
}

/// One visible row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmRow {
    pub alarm: AlarmEvent,
    /// Transient highlight after a live insert or update.
    pub is_new: bool,
}

/// Snapshot of the paged view.
///
/// `visible_rows` and `pending_off_page_events` never share an occurrence id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedView {
    /// 1-based.
    pub page_index: u32,
    pub page_size: usize,
    pub total_count: u64,
    pub visible_rows: Vec<AlarmRow>,
    pub pending_off_page_events: VecDeque<AlarmEvent>,
    /// Live events seen off-page since the last flush.
    pub pending_count: u64,
    #[serde(skip)]
    pub filter: AlarmFilter,
}

impl PagedView {
    fn empty(page_size: usize) -> Self {
        Self {
            page_index: 1,
            page_size,
            total_count: 0,
            visible_rows: Vec::new(),
            pending_off_page_events: VecDeque::new(),
            pending_count: 0,
            filter: AlarmFilter::default(),
        }
    }

    pub fn row(&self, occurrence_id: crate::model::OccurrenceId) -> Option<&AlarmRow> {
        self.visible_rows
            .iter()
            .find(|r| r.alarm.occurrence_id == occurrence_id)
    }

    pub fn is_first_page(&self) -> bool {
        self.page_index == 1
    }
}
