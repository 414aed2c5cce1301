// End-to-end tests for AlarmMonitor with fake REST collaborators.
#![allow(clippy::unwrap_used)]

mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use pretty_assertions::assert_eq;
use url::Url;

use alarmwire_api::{AlarmQuery, ClientMessage, CloseReason, SessionSignal};
use alarmwire_core::{
    Acknowledgment, AlarmActions, AlarmCountSnapshot, AlarmEvent, AlarmMonitor,
    AlarmSnapshotSource, AlarmState, ConnectionStatus, CoreError, EndpointConfig, ErrorKind,
    EventCategory, MonitorConfig, NotificationSink, OccurrenceId, PhaseKind, Severity,
    SnapshotPage, TlsVerification, ViewConfig,
};

use support::{ScriptedTransport, SessionHandle, Step};

// ── Fake server ──────────────────────────────────────────────────

#[derive(Default)]
struct FakeServer {
    open: Mutex<Vec<AlarmEvent>>,
    acks: Mutex<Vec<(OccurrenceId, Option<String>)>>,
    clears: Mutex<Vec<OccurrenceId>>,
    fetches: AtomicUsize,
    test_alarms: AtomicUsize,
    refuse_clear: AtomicBool,
}

impl FakeServer {
    fn with(alarms: Vec<AlarmEvent>) -> Arc<Self> {
        let server = Self::default();
        *server.open.lock().unwrap() = alarms;
        Arc::new(server)
    }

    fn raise(&self, alarm: AlarmEvent) {
        self.open.lock().unwrap().insert(0, alarm);
    }
}

impl AlarmSnapshotSource for FakeServer {
    fn fetch_active(&self, query: AlarmQuery) -> BoxFuture<'_, Result<SnapshotPage, CoreError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let open = self.open.lock().unwrap();
        let limit = usize::try_from(query.limit).unwrap();
        let skip = usize::try_from(query.page - 1).unwrap() * limit;
        let page = SnapshotPage {
            items: open.iter().skip(skip).take(limit).cloned().collect(),
            total: u64::try_from(open.len()).unwrap(),
            page: query.page,
        };
        futures_util::future::ready(Ok(page)).boxed()
    }
}

impl AlarmActions for FakeServer {
    fn acknowledge(
        &self,
        occurrence_id: OccurrenceId,
        comment: Option<String>,
    ) -> BoxFuture<'_, Result<(), CoreError>> {
        self.acks.lock().unwrap().push((occurrence_id, comment));
        futures_util::future::ready(Ok(())).boxed()
    }

    fn clear(
        &self,
        occurrence_id: OccurrenceId,
        _comment: Option<String>,
    ) -> BoxFuture<'_, Result<(), CoreError>> {
        if self.refuse_clear.load(Ordering::SeqCst) {
            return futures_util::future::ready(Err(CoreError::Api {
                message: "permission denied".into(),
                status: Some(403),
            }))
            .boxed();
        }
        self.clears.lock().unwrap().push(occurrence_id);
        self.open
            .lock()
            .unwrap()
            .retain(|a| a.occurrence_id != occurrence_id);
        futures_util::future::ready(Ok(())).boxed()
    }

    fn trigger_test_alarm(&self) -> BoxFuture<'_, Result<(), CoreError>> {
        self.test_alarms.fetch_add(1, Ordering::SeqCst);
        futures_util::future::ready(Ok(())).boxed()
    }
}

#[derive(Default)]
struct CountingSink {
    raised: AtomicUsize,
    acknowledged: AtomicUsize,
    connection_changes: AtomicUsize,
}

impl NotificationSink for CountingSink {
    fn alarm_raised(&self, _alarm: &AlarmEvent) {
        self.raised.fetch_add(1, Ordering::SeqCst);
    }

    fn alarm_acknowledged(&self, _ack: &Acknowledgment) {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
    }

    fn connection_changed(&self, _status: &ConnectionStatus) {
        self.connection_changes.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Fixtures ─────────────────────────────────────────────────────

struct Fixture {
    monitor: AlarmMonitor,
    server: Arc<FakeServer>,
    transport: Arc<ScriptedTransport>,
    sessions: tokio::sync::mpsc::UnboundedReceiver<SessionHandle>,
}

fn fixture(alarms: Vec<AlarmEvent>, steps: Vec<Step>, page_size: usize) -> Fixture {
    let server = FakeServer::with(alarms);
    let (transport, sessions) = ScriptedTransport::new(steps);
    let config = MonitorConfig {
        endpoint: EndpointConfig {
            push_url: Some(Url::parse("ws://alarms.test/ws").unwrap()),
            ..EndpointConfig::default()
        },
        tenant_id: Some(7),
        view: ViewConfig {
            page_size,
            ..ViewConfig::default()
        },
        ..MonitorConfig::default()
    };
    let monitor = AlarmMonitor::new(config, transport.clone(), server.clone(), server.clone());
    Fixture {
        monitor,
        server,
        transport,
        sessions,
    }
}

/// Three open alarms, one of them high.
fn seeded() -> Vec<AlarmEvent> {
    vec![
        AlarmEvent::new(3, Severity::Low, "Filter dP drifting"),
        AlarmEvent::new(2, Severity::High, "Boiler pressure high"),
        AlarmEvent::new(1, Severity::Medium, "Door ajar"),
    ]
}

fn counts(active_total: u64, critical_total: u64) -> AlarmCountSnapshot {
    AlarmCountSnapshot {
        active_total,
        critical_total,
    }
}

// ── Counts ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn counts_track_snapshot_live_alarm_and_clear() {
    let mut fx = fixture(seeded(), vec![Step::Accept], 25);
    fx.monitor.init().await.unwrap();
    assert_eq!(fx.monitor.counts(), counts(3, 1));

    let session = fx.sessions.recv().await.unwrap();
    let frame = support::alarm_frame("alarm:critical", 10, "high");
    session.push_frame(&frame);
    session.push_frame(&frame);
    support::settle().await;

    assert_eq!(fx.monitor.counts(), counts(4, 2));
    let view = fx.monitor.view();
    assert_eq!(view.visible_rows.len(), 4);
    assert_eq!(view.visible_rows[0].alarm.occurrence_id, OccurrenceId(10));
    assert_eq!(view.total_count, 4);

    fx.monitor.clear(OccurrenceId(10), None).await.unwrap();
    assert_eq!(fx.monitor.counts(), counts(3, 1));
    assert!(fx.monitor.view().row(OccurrenceId(10)).is_none());
    assert_eq!(*fx.server.clears.lock().unwrap(), vec![OccurrenceId(10)]);
    fx.monitor.dispose();
}

#[tokio::test(start_paused = true)]
async fn severity_escalation_moves_critical_count() {
    let mut fx = fixture(seeded(), vec![Step::Accept], 25);
    fx.monitor.init().await.unwrap();
    let session = fx.sessions.recv().await.unwrap();

    session.push_frame(&support::alarm_frame("alarm:new", 1, "critical"));
    support::settle().await;
    assert_eq!(fx.monitor.counts(), counts(3, 2));
    fx.monitor.dispose();
}

#[tokio::test(start_paused = true)]
async fn leaving_open_states_releases_the_count() {
    let mut fx = fixture(seeded(), vec![Step::Accept], 25);
    fx.monitor.init().await.unwrap();
    let session = fx.sessions.recv().await.unwrap();

    session.push_frame(&support::alarm_frame_in_state("alarm:new", 2, "high", "shelved"));
    session.push_frame(&support::alarm_frame_in_state("alarm:new", 1, "medium", "inactive"));
    support::settle().await;
    assert_eq!(fx.monitor.counts(), counts(1, 0));

    // Redelivery in the same state does not count twice downwards.
    session.push_frame(&support::alarm_frame_in_state("alarm:new", 2, "high", "shelved"));
    support::settle().await;
    assert_eq!(fx.monitor.counts(), counts(1, 0));

    // Back to active counts again.
    session.push_frame(&support::alarm_frame("alarm:new", 2, "high"));
    support::settle().await;
    assert_eq!(fx.monitor.counts(), counts(2, 1));
    fx.monitor.dispose();
}

#[tokio::test(start_paused = true)]
async fn refused_clear_leaves_counts_and_reports() {
    let fx = fixture(seeded(), vec![Step::Accept], 25);
    let errors = support::record_errors(fx.monitor.dispatcher());
    fx.monitor.init().await.unwrap();
    fx.server.refuse_clear.store(true, Ordering::SeqCst);

    let err = fx.monitor.clear(OccurrenceId(2), None).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { status: Some(403), .. }));
    assert_eq!(fx.monitor.counts(), counts(3, 1));
    assert!(fx.monitor.view().row(OccurrenceId(2)).is_some());

    let reported = errors.items();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind, ErrorKind::Action);
    assert_eq!(reported[0].occurrence_id, Some(OccurrenceId(2)));
    fx.monitor.dispose();
}

// ── Acknowledge ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn acknowledge_goes_over_push_when_connected() {
    let mut fx = fixture(seeded(), vec![Step::Accept], 25);
    fx.monitor.init().await.unwrap();
    let mut session = fx.sessions.recv().await.unwrap();
    session.drain_sent();

    fx.monitor
        .acknowledge(OccurrenceId(2), Some("on it".into()))
        .await
        .unwrap();

    let sent = session.drain_sent();
    assert_eq!(sent.len(), 1);
    let ClientMessage::AcknowledgeAlarm {
        occurrence_id,
        user_id,
        comment,
        ..
    } = &sent[0]
    else {
        panic!("expected acknowledge_alarm, got {sent:?}");
    };
    assert_eq!(*occurrence_id, 2);
    assert_eq!(user_id, "operator");
    assert_eq!(comment.as_deref(), Some("on it"));
    assert!(fx.server.acks.lock().unwrap().is_empty());

    let row = fx.monitor.view().row(OccurrenceId(2)).cloned().unwrap();
    assert_eq!(row.alarm.state, AlarmState::Acknowledged);
    // Still open, so still counted.
    assert_eq!(fx.monitor.counts(), counts(3, 1));
    fx.monitor.dispose();
}

#[tokio::test(start_paused = true)]
async fn acknowledge_falls_back_to_rest_when_disconnected() {
    let fx = fixture(seeded(), vec![Step::Fail("refused".into())], 25);
    fx.monitor.init().await.unwrap();
    assert_eq!(fx.monitor.connection().phase(), PhaseKind::Backoff);

    fx.monitor.acknowledge(OccurrenceId(1), None).await.unwrap();
    assert_eq!(
        *fx.server.acks.lock().unwrap(),
        vec![(OccurrenceId(1), None)]
    );
    let row = fx.monitor.view().row(OccurrenceId(1)).cloned().unwrap();
    assert_eq!(row.alarm.state, AlarmState::Acknowledged);
    fx.monitor.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_alarm_goes_through_rest() {
    let fx = fixture(Vec::new(), vec![Step::Accept], 25);
    fx.monitor.init().await.unwrap();
    fx.monitor.inject_test_alarm().await.unwrap();
    assert_eq!(fx.server.test_alarms.load(Ordering::SeqCst), 1);
    fx.monitor.dispose();
}

// ── Reconnect & paging ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reconnect_resyncs_counts_and_page() {
    let mut fx = fixture(seeded(), vec![Step::Accept, Step::Accept], 25);
    fx.monitor.init().await.unwrap();
    let first = fx.sessions.recv().await.unwrap();
    let fetches = fx.server.fetches.load(Ordering::SeqCst);

    // Raised while we are away; never replayed on the new session.
    first
        .signals
        .send(SessionSignal::Closed(CloseReason::Transport("reset".into())))
        .unwrap();
    fx.server
        .raise(AlarmEvent::new(40, Severity::Critical, "Tank overflow"));

    let _second = fx.sessions.recv().await.unwrap();
    support::settle().await;

    assert!(fx.monitor.connection().is_connected());
    assert!(fx.server.fetches.load(Ordering::SeqCst) >= fetches + 2);
    assert_eq!(fx.monitor.counts(), counts(4, 2));
    assert!(fx.monitor.view().row(OccurrenceId(40)).is_some());
    assert_eq!(fx.transport.opens(), 2);
    fx.monitor.dispose();
}

#[tokio::test(start_paused = true)]
async fn off_page_events_wait_for_flush() {
    let alarms = (1..=5_i64)
        .rev()
        .map(|id| AlarmEvent::new(id, Severity::Medium, format!("alarm {id}")))
        .collect();
    let mut fx = fixture(alarms, vec![Step::Accept], 2);
    fx.monitor.init().await.unwrap();
    let session = fx.sessions.recv().await.unwrap();

    fx.monitor.set_page(2).await.unwrap();
    let page_two: Vec<_> = fx
        .monitor
        .view()
        .visible_rows
        .iter()
        .map(|r| r.alarm.occurrence_id.get())
        .collect();
    assert_eq!(page_two, vec![3, 2]);

    fx.server
        .raise(AlarmEvent::new(20, Severity::High, "alarm 20"));
    session.push_frame(&support::alarm_frame("alarm:new", 20, "high"));
    support::settle().await;

    let view = fx.monitor.view();
    assert_eq!(view.pending_count, 1);
    assert_eq!(view.total_count, 5);
    assert!(view.row(OccurrenceId(20)).is_none());

    fx.monitor.jump_to_first_page_and_flush().await.unwrap();
    let view = fx.monitor.view();
    assert_eq!(view.page_index, 1);
    assert_eq!(view.pending_count, 0);
    assert!(view.pending_off_page_events.is_empty());
    assert_eq!(view.visible_rows[0].alarm.occurrence_id, OccurrenceId(20));
    assert_eq!(view.total_count, 6);
    fx.monitor.dispose();
}

// ── Notifications & lifecycle ────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn notifier_fires_once_per_new_occurrence() {
    let mut fx = fixture(seeded(), vec![Step::Accept], 25);
    let sink = Arc::new(CountingSink::default());
    fx.monitor.set_notifier(sink.clone());
    fx.monitor.init().await.unwrap();
    let session = fx.sessions.recv().await.unwrap();

    session.push_frame(&support::alarm_frame("alarm:new", 11, "low"));
    session.push_frame(&support::alarm_frame("alarm:new", 11, "low"));
    // Already counted by the snapshot.
    session.push_frame(&support::alarm_frame("alarm:new", 2, "high"));
    session.push_frame(r#"{"event":"alarm:acknowledged","data":{"occurrence_id":11}}"#);
    support::settle().await;

    assert_eq!(sink.raised.load(Ordering::SeqCst), 1);
    assert_eq!(sink.acknowledged.load(Ordering::SeqCst), 1);
    assert!(sink.connection_changes.load(Ordering::SeqCst) >= 2);
    fx.monitor.dispose();
}

#[tokio::test(start_paused = true)]
async fn init_is_exclusive_and_dispose_tears_down() {
    let fx = fixture(seeded(), vec![Step::Accept], 25);
    fx.monitor.init().await.unwrap();
    assert!(matches!(
        fx.monitor.init().await,
        Err(CoreError::AlreadyInitialized)
    ));
    assert_eq!(
        fx.monitor
            .dispatcher()
            .handler_count(EventCategory::AlarmTriggered),
        1
    );

    fx.monitor.dispose();
    assert_eq!(
        fx.monitor
            .dispatcher()
            .handler_count(EventCategory::AlarmTriggered),
        0
    );
    assert_eq!(fx.monitor.connection().phase(), PhaseKind::Idle);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fx.transport.opens(), 1);
}

// ── Default wiring ───────────────────────────────────────────────

fn https_config(tls: TlsVerification) -> MonitorConfig {
    MonitorConfig {
        endpoint: EndpointConfig {
            origin: Some(Url::parse("https://plant.test").unwrap()),
            ..EndpointConfig::default()
        },
        tls,
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn default_wiring_builds_with_accept_invalid_tls() {
    let monitor = AlarmMonitor::with_defaults(https_config(TlsVerification::DangerAcceptInvalid));
    assert!(monitor.is_ok());
}

#[tokio::test]
async fn default_wiring_rejects_unreadable_ca_file() {
    let config = https_config(TlsVerification::CustomCa("/nonexistent/ca.pem".into()));
    let Err(err) = AlarmMonitor::with_defaults(config) else {
        panic!("expected a TLS failure");
    };
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "{err:?}");
}
