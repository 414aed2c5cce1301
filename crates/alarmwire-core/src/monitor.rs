// ── Alarm monitor ──
//
// Composition root. Wires the connection manager, dispatcher, count
// aggregate and paged view to the REST collaborators, and owns their
// lifecycle between `init()` and `dispose()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use alarmwire_api::{AlarmClient, AlarmQuery, ClientMessage, PushTransport, WebSocketTransport};

use crate::collaborator::{AlarmActions, AlarmSnapshotSource};
use crate::config::MonitorConfig;
use crate::connection::{ConnectionManager, ConnectionSettings};
use crate::counts::{AlarmCountAggregate, AlarmCountSnapshot};
use crate::dispatch::{EventDispatcher, Subscription};
use crate::error::CoreError;
use crate::model::{
    Acknowledgment, AlarmEvent, AlarmState, ConnectionStatus, ErrorEvent, ErrorKind, OccurrenceId,
    Severity,
};
use crate::notify::NotificationSink;
use crate::stream::SnapshotStream;
use crate::view::{AlarmFilter, PagedAlarmReconciler, PagedView};

// ── AlarmMonitor ─────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Construct it, call
/// [`init()`](Self::init), read counts and the paged view, and call
/// [`dispose()`](Self::dispose) when done.
#[derive(Clone)]
pub struct AlarmMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: MonitorConfig,
    dispatcher: EventDispatcher,
    connection: ConnectionManager,
    counts: AlarmCountAggregate,
    view: PagedAlarmReconciler,
    snapshots: Arc<dyn AlarmSnapshotSource>,
    actions: Arc<dyn AlarmActions>,
    notifier: Mutex<Option<Arc<dyn NotificationSink>>>,
    /// Open occurrences already counted, with the severity they were
    /// counted under.
    ledger: DashMap<OccurrenceId, Severity>,
    subscriptions: Mutex<Vec<Subscription>>,
    cancel: Mutex<CancellationToken>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    initialized: AtomicBool,
}

impl std::fmt::Debug for AlarmMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmMonitor")
            .field("connection", &self.inner.connection)
            .field("counts", &self.inner.counts.snapshot())
            .field("initialized", &self.inner.initialized.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AlarmMonitor {
    /// Build a monitor from explicit collaborators. Does NOT connect.
    pub fn new(
        config: MonitorConfig,
        transport: Arc<dyn PushTransport>,
        snapshots: Arc<dyn AlarmSnapshotSource>,
        actions: Arc<dyn AlarmActions>,
    ) -> Self {
        let dispatcher = EventDispatcher::new();
        let connection = ConnectionManager::new(
            transport,
            ConnectionSettings::from(&config),
            dispatcher.clone(),
        );
        let view = PagedAlarmReconciler::new(config.view.clone());
        Self {
            inner: Arc::new(MonitorInner {
                config,
                dispatcher,
                connection,
                counts: AlarmCountAggregate::new(),
                view,
                snapshots,
                actions,
                notifier: Mutex::new(None),
                ledger: DashMap::new(),
                subscriptions: Mutex::new(Vec::new()),
                cancel: Mutex::new(CancellationToken::new()),
                tasks: Mutex::new(Vec::new()),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Build a monitor backed by the WebSocket transport and the REST client.
    pub fn with_defaults(config: MonitorConfig) -> Result<Self, CoreError> {
        let api_url = config.endpoint.resolve_api_url()?;
        let transport_config = config.transport_config();
        let client = Arc::new(AlarmClient::new(api_url, &transport_config)?);
        let push = WebSocketTransport::with_tls(&transport_config.tls)?;
        let snapshots: Arc<dyn AlarmSnapshotSource> = client.clone();
        let actions: Arc<dyn AlarmActions> = client;
        Ok(Self::new(config, Arc::new(push), snapshots, actions))
    }

    /// Install (or replace) the notification sink.
    pub fn set_notifier(&self, sink: Arc<dyn NotificationSink>) {
        *lock(&self.inner.notifier) = Some(sink);
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Register handlers, seed counts and the first page, connect, and
    /// start the reconnect-resync watcher.
    ///
    /// Snapshot and connection failures are logged and reported on the
    /// error category; `init` itself only fails when already running.
    pub async fn init(&self) -> Result<(), CoreError> {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            return Err(CoreError::AlreadyInitialized);
        }
        let cancel = CancellationToken::new();
        *lock(&self.inner.cancel) = cancel.clone();

        self.register_handlers();

        if let Err(e) = self.inner.refresh().await {
            warn!(error = %e, "initial snapshot failed; counts start at zero");
        }
        if let Err(e) = self.inner.connection.connect().await {
            warn!(error = %e, "initial connect failed; retrying in background");
        }

        let status = self.inner.connection.subscribe_status();
        let watcher = tokio::spawn(watch_reconnects(Arc::downgrade(&self.inner), status, cancel));
        lock(&self.inner.tasks).push(watcher);

        info!(
            connected = self.inner.connection.is_connected(),
            counts = ?self.inner.counts.snapshot(),
            "alarm monitor started"
        );
        Ok(())
    }

    /// Unsubscribe handlers, disconnect, and stop every background task
    /// and highlight timer. The monitor can be `init`ed again afterwards.
    pub fn dispose(&self) {
        if !self.inner.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        lock(&self.inner.cancel).cancel();
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
        lock(&self.inner.subscriptions).clear();
        self.inner.connection.disconnect();
        self.inner.view.cancel_highlights();
        info!("alarm monitor stopped");
    }

    fn register_handlers(&self) {
        let dispatcher = &self.inner.dispatcher;
        let mut subscriptions = Vec::with_capacity(3);

        let weak = Arc::downgrade(&self.inner);
        subscriptions.push(dispatcher.on_alarm(move |alarm| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_alarm(alarm);
            }
            Ok(())
        }));

        let weak = Arc::downgrade(&self.inner);
        subscriptions.push(dispatcher.on_acknowledgment(move |ack| {
            if let Some(inner) = weak.upgrade() {
                inner.view.acknowledge(ack);
                if let Some(sink) = inner.notifier() {
                    sink.alarm_acknowledged(ack);
                }
            }
            Ok(())
        }));

        let weak = Arc::downgrade(&self.inner);
        subscriptions.push(dispatcher.on_connection_change(move |status| {
            if let Some(sink) = weak.upgrade().and_then(|inner| inner.notifier()) {
                sink.connection_changed(status);
            }
            Ok(())
        }));

        *lock(&self.inner.subscriptions) = subscriptions;
    }

    // ── Actions ──────────────────────────────────────────────────

    /// Acknowledge an occurrence.
    ///
    /// The view is updated optimistically. The acknowledgment goes out on
    /// the push channel when connected, otherwise through REST.
    pub async fn acknowledge(
        &self,
        occurrence_id: OccurrenceId,
        comment: Option<String>,
    ) -> Result<(), CoreError> {
        let inner = &self.inner;
        let user_id = inner.config.user_id.clone();
        let timestamp = Utc::now();
        inner.view.acknowledge(&Acknowledgment {
            occurrence_id,
            acknowledged_by: Some(user_id.clone()),
            comment: comment.clone(),
            timestamp,
        });

        if inner.connection.is_connected() {
            let frame = ClientMessage::AcknowledgeAlarm {
                occurrence_id: occurrence_id.get(),
                user_id,
                comment: comment.clone(),
                timestamp,
            };
            match inner.connection.send(frame) {
                Ok(()) => {
                    debug!(%occurrence_id, "acknowledgment sent on push channel");
                    return Ok(());
                }
                Err(e) => debug!(%occurrence_id, error = %e, "push send failed, using REST"),
            }
        }

        inner
            .actions
            .acknowledge(occurrence_id, comment)
            .await
            .inspect_err(|e| inner.report_action("acknowledge", Some(occurrence_id), e))
    }

    /// Clear an occurrence on the server, then drop it locally and adjust
    /// the counts.
    pub async fn clear(
        &self,
        occurrence_id: OccurrenceId,
        comment: Option<String>,
    ) -> Result<(), CoreError> {
        let inner = &self.inner;
        inner
            .actions
            .clear(occurrence_id, comment)
            .await
            .inspect_err(|e| inner.report_action("clear", Some(occurrence_id), e))?;

        let removed = inner.view.clear(occurrence_id);
        let severity = inner
            .ledger
            .remove(&occurrence_id)
            .map(|(_, severity)| severity)
            .or_else(|| removed.map(|alarm| alarm.severity));
        // Unknown occurrences still count as one fewer open alarm; the next
        // snapshot corrects the critical total if that guess was wrong.
        inner.counts.decrement(severity.unwrap_or(Severity::Info));
        info!(%occurrence_id, "alarm cleared");
        Ok(())
    }

    /// Ask the server to raise a test alarm. It arrives over the push
    /// channel like any other.
    pub async fn inject_test_alarm(&self) -> Result<(), CoreError> {
        self.inner
            .actions
            .trigger_test_alarm()
            .await
            .inspect_err(|e| self.inner.report_action("test alarm", None, e))
    }

    /// Re-seed counts and re-fetch the current page.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.inner.refresh().await
    }

    pub async fn set_page(&self, page_index: u32) -> Result<(), CoreError> {
        self.inner.view.set_page(page_index);
        self.inner.refresh_page().await
    }

    pub async fn set_filter(&self, filter: AlarmFilter) -> Result<(), CoreError> {
        self.inner.view.set_filter(filter);
        self.inner.refresh_page().await
    }

    /// Return to page 1, drop buffered off-page events and re-fetch.
    pub async fn jump_to_first_page_and_flush(&self) -> Result<(), CoreError> {
        self.inner.view.jump_to_first_page_and_flush();
        self.inner.refresh_page().await
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn counts(&self) -> AlarmCountSnapshot {
        self.inner.counts.snapshot()
    }

    pub fn view(&self) -> Arc<PagedView> {
        self.inner.view.view()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.connection.status()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    pub fn reconciler(&self) -> &PagedAlarmReconciler {
        &self.inner.view
    }

    pub fn count_stream(&self) -> SnapshotStream<AlarmCountSnapshot> {
        SnapshotStream::new(self.inner.counts.subscribe())
    }

    pub fn view_stream(&self) -> SnapshotStream<Arc<PagedView>> {
        SnapshotStream::new(self.inner.view.subscribe())
    }

    pub fn status_stream(&self) -> SnapshotStream<ConnectionStatus> {
        SnapshotStream::new(self.inner.connection.subscribe_status())
    }
}

// ── Internals ────────────────────────────────────────────────────

impl MonitorInner {
    fn notifier(&self) -> Option<Arc<dyn NotificationSink>> {
        lock(&self.notifier).clone()
    }

    fn handle_alarm(&self, alarm: &AlarmEvent) {
        let id = alarm.occurrence_id;
        if alarm.state.is_open() {
            match self.ledger.insert(id, alarm.severity) {
                None => {
                    self.counts.increment(alarm.severity);
                    if let Some(sink) = self.notifier() {
                        sink.alarm_raised(alarm);
                    }
                }
                Some(previous) if previous.is_critical() != alarm.is_critical() => {
                    self.counts.decrement(previous);
                    self.counts.increment(alarm.severity);
                }
                Some(_) => {}
            }
            self.view.on_alarm(alarm);
        } else {
            // Left the open states: stop counting it.
            if let Some((_, severity)) = self.ledger.remove(&id) {
                self.counts.decrement(severity);
            }
            if alarm.state == AlarmState::Cleared {
                self.view.clear(id);
            } else {
                self.view.on_alarm(alarm);
            }
        }
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        let counts = self.refresh_counts().await;
        let page = self.refresh_page().await;
        counts.and(page)
    }

    async fn refresh_counts(&self) -> Result<(), CoreError> {
        let query = AlarmQuery {
            page: 1,
            limit: self.config.snapshot_limit,
            ..AlarmQuery::default()
        };
        let snapshot = self
            .snapshots
            .fetch_active(query)
            .await
            .inspect_err(|e| self.report_action("count snapshot", None, e))?;

        let classified = AlarmCountSnapshot::classify(&snapshot.items);
        self.ledger.clear();
        for alarm in snapshot.items.iter().filter(|a| a.state.is_open()) {
            self.ledger.insert(alarm.occurrence_id, alarm.severity);
        }
        self.counts.set_absolute(
            snapshot.total.max(classified.active_total),
            classified.critical_total,
        );
        Ok(())
    }

    async fn refresh_page(&self) -> Result<(), CoreError> {
        let page_index = self.view.page_index();
        let limit = u32::try_from(self.view.config().page_size).unwrap_or(u32::MAX);
        let query = self.view.filter().to_query(page_index, limit);
        let page = self
            .snapshots
            .fetch_active(query)
            .await
            .inspect_err(|e| self.report_action("page fetch", None, e))?;
        self.view.apply_page(page_index, page.items, page.total);
        Ok(())
    }

    fn report_action(&self, action: &str, occurrence_id: Option<OccurrenceId>, err: &CoreError) {
        warn!(action, occurrence_id = ?occurrence_id, error = %err, "alarm action failed");
        let mut event = ErrorEvent::new(ErrorKind::Action, format!("{action}: {err}"));
        if let Some(id) = occurrence_id {
            event = event.for_occurrence(id);
        }
        self.dispatcher.publish_error(event);
    }
}

/// Re-seed after every reconnect; events missed while disconnected are
/// never replayed by the server.
async fn watch_reconnects(
    inner: Weak<MonitorInner>,
    mut status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
) {
    status.mark_unchanged();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let connected = status.borrow_and_update().is_connected();
                if connected {
                    let Some(inner) = inner.upgrade() else { break };
                    info!("push channel reconnected, resyncing");
                    if let Err(e) = inner.refresh().await {
                        warn!(error = %e, "resync after reconnect failed");
                    }
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
