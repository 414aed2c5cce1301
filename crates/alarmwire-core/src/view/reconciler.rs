// ── Live-to-page reconciliation ──
//
// Keyed on "is the user on page 1 of the active filter". Page 1 absorbs
// matching live events directly; everything else is buffered so rows never
// shift under a reader on a later page. `occurrence_id` is the merge key
// throughout, so redelivery and reordering collapse into last-write-wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{AlarmFilter, AlarmRow, PagedView, PendingPolicy, ViewConfig};
use crate::model::{Acknowledgment, AlarmEvent, AlarmState, OccurrenceId};

/// Where a live event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Prepended to page 1 as a new row.
    Inserted,
    /// Replaced an already visible row in place.
    Updated,
    /// Kept off the page and counted in `pending_count`.
    Buffered,
}

struct Highlight {
    generation: u64,
    cancel: CancellationToken,
}

struct Inner {
    config: ViewConfig,
    state: Mutex<PagedView>,
    view_tx: watch::Sender<Arc<PagedView>>,
    highlights: DashMap<OccurrenceId, Highlight>,
    highlight_seq: AtomicU64,
}

/// Merges live alarm events into a bounded, filtered, paginated view.
///
/// Cheaply cloneable. Every mutation publishes a fresh [`PagedView`]
/// snapshot on a `watch` channel.
#[derive(Clone)]
pub struct PagedAlarmReconciler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PagedAlarmReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedAlarmReconciler")
            .field("config", &self.inner.config)
            .field("highlights", &self.inner.highlights.len())
            .finish_non_exhaustive()
    }
}

impl PagedAlarmReconciler {
    pub fn new(mut config: ViewConfig) -> Self {
        config.page_size = config.page_size.max(1);
        let view = PagedView::empty(config.page_size);
        let (view_tx, _) = watch::channel(Arc::new(view.clone()));
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(view),
                view_tx,
                highlights: DashMap::new(),
                highlight_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.inner.config
    }

    /// Latest published snapshot.
    pub fn view(&self) -> Arc<PagedView> {
        self.inner.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PagedView>> {
        self.inner.view_tx.subscribe()
    }

    pub fn filter(&self) -> AlarmFilter {
        self.inner.lock().filter.clone()
    }

    pub fn page_index(&self) -> u32 {
        self.inner.lock().page_index
    }

    // ── Live stream ──────────────────────────────────────────────────

    /// Merge one live alarm event.
    ///
    /// Only page 1 under a matching filter absorbs events. Anywhere else
    /// the event is counted in `pending_count` and `visible_rows` keeps its
    /// rows, with two exceptions that keep the row list and the buffer
    /// disjoint:
    /// - on page 1, an update that no longer matches the filter takes its
    ///   row out of the page before it is buffered;
    /// - on a later page, an update for a row already on screen is counted
    ///   but not buffered. The row stays as fetched until the next page load.
    pub fn on_alarm(&self, alarm: &AlarmEvent) -> Placement {
        let inner = &self.inner;
        let mut view = inner.lock();
        let id = alarm.occurrence_id;
        let visible = view
            .visible_rows
            .iter()
            .position(|r| r.alarm.occurrence_id == id);

        let placement = if view.is_first_page() && view.filter.matches(alarm) {
            if let Some(pos) = visible {
                let row = &mut view.visible_rows[pos];
                row.alarm = alarm.clone();
                row.is_new = true;
                inner.schedule_highlight(id);
                Placement::Updated
            } else {
                view.pending_off_page_events.retain(|e| e.occurrence_id != id);
                view.visible_rows.insert(
                    0,
                    AlarmRow {
                        alarm: alarm.clone(),
                        is_new: true,
                    },
                );
                view.total_count = view.total_count.saturating_add(1);
                while view.visible_rows.len() > view.page_size {
                    if let Some(dropped) = view.visible_rows.pop() {
                        inner.cancel_highlight(dropped.alarm.occurrence_id);
                    }
                }
                inner.schedule_highlight(id);
                Placement::Inserted
            }
        } else {
            match visible {
                Some(pos) if view.is_first_page() => {
                    view.visible_rows.remove(pos);
                    view.total_count = view.total_count.saturating_sub(1);
                    inner.cancel_highlight(id);
                    inner.buffer(&mut view, alarm);
                }
                Some(_) => {}
                None => inner.buffer(&mut view, alarm),
            }
            view.pending_count = view.pending_count.saturating_add(1);
            Placement::Buffered
        };

        trace!(occurrence_id = %id, ?placement, "live alarm reconciled");
        inner.publish(&view);
        placement
    }

    /// Mark an occurrence acknowledged, whether the acknowledgment came
    /// from the server or from a local user action. Returns `false` when
    /// the occurrence is not held by this view.
    pub fn acknowledge(&self, ack: &Acknowledgment) -> bool {
        let mut view = self.inner.lock();
        let id = ack.occurrence_id;
        let mut changed = false;

        let rows = view.visible_rows.iter_mut().map(|r| &mut r.alarm);
        for alarm in rows.filter(|a| a.occurrence_id == id) {
            if alarm.state != AlarmState::Cleared {
                alarm.state = AlarmState::Acknowledged;
                changed = true;
            }
        }
        for alarm in view
            .pending_off_page_events
            .iter_mut()
            .filter(|a| a.occurrence_id == id)
        {
            if alarm.state != AlarmState::Cleared {
                alarm.state = AlarmState::Acknowledged;
                changed = true;
            }
        }

        if changed {
            self.inner.publish(&view);
        }
        changed
    }

    /// Remove a cleared occurrence. Returns the removed event if this view
    /// held it.
    pub fn clear(&self, occurrence_id: OccurrenceId) -> Option<AlarmEvent> {
        let mut view = self.inner.lock();

        let visible_pos = view
            .visible_rows
            .iter()
            .position(|r| r.alarm.occurrence_id == occurrence_id);
        let visible = visible_pos.map(|pos| view.visible_rows.remove(pos).alarm);
        if visible.is_some() {
            view.total_count = view.total_count.saturating_sub(1);
        }
        let buffered_pos = view
            .pending_off_page_events
            .iter()
            .position(|e| e.occurrence_id == occurrence_id);
        let buffered = buffered_pos.and_then(|pos| view.pending_off_page_events.remove(pos));

        self.inner.cancel_highlight(occurrence_id);
        let removed = visible.or(buffered);
        if removed.is_some() {
            debug!(%occurrence_id, "alarm removed from view");
            self.inner.publish(&view);
        }
        removed
    }

    // ── Page management ──────────────────────────────────────────────

    /// Replace the page with server-authoritative rows. Ignored (returns
    /// `false`) if the user has since moved to another page.
    pub fn apply_page(&self, page_index: u32, rows: Vec<AlarmEvent>, total_count: u64) -> bool {
        let mut view = self.inner.lock();
        if view.page_index != page_index {
            debug!(
                fetched = page_index,
                current = view.page_index,
                "discarding stale page"
            );
            return false;
        }

        for row in &view.visible_rows {
            self.inner.cancel_highlight(row.alarm.occurrence_id);
        }
        let page_size = view.page_size;
        view.visible_rows = rows
            .into_iter()
            .take(page_size)
            .map(|alarm| AlarmRow {
                alarm,
                is_new: false,
            })
            .collect();
        view.total_count = total_count;

        let PagedView {
            visible_rows,
            pending_off_page_events,
            ..
        } = &mut *view;
        pending_off_page_events
            .retain(|e| !visible_rows.iter().any(|r| r.alarm.occurrence_id == e.occurrence_id));

        self.inner.publish(&view);
        true
    }

    /// Move to another page. Rows stay until the next `apply_page`.
    pub fn set_page(&self, page_index: u32) {
        let mut view = self.inner.lock();
        view.page_index = page_index.max(1);
        self.inner.publish(&view);
    }

    /// Change the filter and return to page 1. The pending buffer is kept
    /// or discarded per [`PendingPolicy`].
    pub fn set_filter(&self, filter: AlarmFilter) {
        let mut view = self.inner.lock();
        view.filter = filter;
        view.page_index = 1;
        if self.inner.config.pending_policy == PendingPolicy::Discard {
            view.pending_off_page_events.clear();
            view.pending_count = 0;
        }
        self.inner.publish(&view);
    }

    /// Go to page 1 and drop the off-page buffer. Buffered events are not
    /// replayed; a fresh page fetch is expected to follow.
    pub fn jump_to_first_page_and_flush(&self) {
        let mut view = self.inner.lock();
        view.page_index = 1;
        view.pending_off_page_events.clear();
        view.pending_count = 0;
        self.inner.publish(&view);
    }

    /// Cancel every pending highlight timer.
    pub fn cancel_highlights(&self) {
        self.inner.highlights.retain(|_, h| {
            h.cancel.cancel();
            false
        });
    }
}

// ── Internals ────────────────────────────────────────────────────────

impl Inner {
    fn lock(&self) -> MutexGuard<'_, PagedView> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the off-page FIFO; a re-delivered id replaces its entry.
    fn buffer(&self, view: &mut PagedView, alarm: &AlarmEvent) {
        let pending = &mut view.pending_off_page_events;
        if let Some(slot) = pending
            .iter_mut()
            .find(|e| e.occurrence_id == alarm.occurrence_id)
        {
            *slot = alarm.clone();
        } else {
            pending.push_back(alarm.clone());
            while pending.len() > self.config.pending_capacity {
                pending.pop_front();
            }
        }
    }

    fn publish(&self, view: &PagedView) {
        self.view_tx.send_replace(Arc::new(view.clone()));
    }

    /// (Re)start the unmark timer for `id`. Must be called with the state
    /// lock held so a newer schedule always supersedes an older one.
    fn schedule_highlight(self: &Arc<Self>, id: OccurrenceId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            trace!(occurrence_id = %id, "no runtime, highlight stays until replaced");
            return;
        };

        let generation = self.highlight_seq.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        if let Some(previous) = self.highlights.insert(
            id,
            Highlight {
                generation,
                cancel: cancel.clone(),
            },
        ) {
            previous.cancel.cancel();
        }

        let weak = Arc::downgrade(self);
        let delay = self.config.highlight_duration;
        runtime.spawn(unmark_after(weak, id, generation, delay, cancel));
    }

    fn cancel_highlight(&self, id: OccurrenceId) {
        if let Some((_, highlight)) = self.highlights.remove(&id) {
            highlight.cancel.cancel();
        }
    }

    fn unmark(&self, id: OccurrenceId, generation: u64) {
        let mut view = self.lock();
        if self
            .highlights
            .remove_if(&id, |_, h| h.generation == generation)
            .is_none()
        {
            return;
        }
        if let Some(row) = view
            .visible_rows
            .iter_mut()
            .find(|r| r.alarm.occurrence_id == id)
        {
            row.is_new = false;
            self.publish(&view);
        }
    }
}

async fn unmark_after(
    inner: Weak<Inner>,
    id: OccurrenceId,
    generation: u64,
    delay: std::time::Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(delay) => {
            if let Some(inner) = inner.upgrade() {
                inner.unmark(id, generation);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
