// Integration tests for the connection manager, driven by a scripted transport.
#![allow(clippy::unwrap_used)]

mod support;

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::Instant;

use alarmwire_api::{ClientMessage, CloseReason, SessionSignal, TransportKind};
use alarmwire_core::{
    ConnectError, ConnectionManager, ConnectionState, ErrorKind, EventDispatcher, FailureKind,
    PhaseKind, ReconnectConfig, Severity,
};

use support::{ScriptedTransport, Step};

fn reconnect(initial_secs: u64, max_retries: u32) -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_secs(initial_secs),
        max_delay: Duration::from_secs(30),
        max_retries,
    }
}

fn manager(
    steps: impl IntoIterator<Item = Step>,
    reconnect: ReconnectConfig,
) -> (
    ConnectionManager,
    std::sync::Arc<ScriptedTransport>,
    tokio::sync::mpsc::UnboundedReceiver<support::SessionHandle>,
) {
    let (transport, sessions) = ScriptedTransport::new(steps);
    let manager = ConnectionManager::new(
        transport.clone(),
        support::settings(reconnect),
        EventDispatcher::new(),
    );
    (manager, transport, sessions)
}

// ── Single flight ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_connects_share_one_attempt() {
    let (manager, transport, _sessions) =
        manager([Step::AcceptAfter(Duration::from_secs(3))], reconnect(1, 5));

    let (a, b, c) = tokio::join!(manager.connect(), manager.connect(), manager.connect());
    assert_eq!((a, b, c), (Ok(()), Ok(()), Ok(())));
    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.max_in_flight(), 1);
    assert_eq!(manager.phase(), PhaseKind::Connected);

    // Already connected: resolves without opening anything.
    manager.connect().await.unwrap();
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_aborts_in_flight_attempt_before_the_next_one() {
    let (manager, transport, _sessions) = manager([Step::Hang, Step::Accept], reconnect(1, 5));

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.connect().await })
    };
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    assert_eq!(manager.phase(), PhaseKind::Connecting);

    manager.disconnect();
    assert_eq!(manager.phase(), PhaseKind::Idle);
    assert_eq!(first.await.unwrap(), Err(ConnectError::Cancelled));
    assert_eq!(transport.in_flight(), 0);

    manager.connect().await.unwrap();
    assert_eq!(transport.max_in_flight(), 1);
    assert!(manager.is_connected());
}

// ── Timeout & backoff ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn hung_transport_hits_the_connect_timeout() {
    let (manager, transport, _sessions) = manager([Step::Hang], reconnect(1, 5));
    let statuses = support::record_statuses(manager.dispatcher());

    let started = Instant::now();
    let err = manager.connect().await.unwrap_err();

    assert_eq!(err, ConnectError::Timeout { timeout_secs: 20 });
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(transport.in_flight(), 0);
    assert_eq!(manager.phase(), PhaseKind::Backoff);

    let last = statuses.items().pop().unwrap();
    assert_eq!(last.status, ConnectionState::Error);
    assert_eq!(last.failure, Some(FailureKind::Timeout));
    assert_eq!(last.attempt, 1);
    manager.disconnect();
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_retries_until_explicit_connect() {
    let (manager, transport, _sessions) = manager([], reconnect(1, 2));
    let errors = support::record_errors(manager.dispatcher());

    assert!(matches!(
        manager.connect().await,
        Err(ConnectError::Transport(_))
    ));
    assert_eq!(manager.retry_attempt(), 1);

    // Two automatic retries, then give up.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.opens(), 3);
    assert_eq!(manager.phase(), PhaseKind::Fatal);
    let status = manager.status();
    assert_eq!(status.status, ConnectionState::Error);
    assert_eq!(status.failure, Some(FailureKind::MaxRetriesExceeded));
    assert!(
        errors
            .items()
            .iter()
            .any(|e| e.kind == ErrorKind::MaxRetriesExceeded)
    );

    // Nothing happens on its own once fatal.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(transport.opens(), 3);

    // An explicit connect starts a fresh budget.
    transport.push(Step::Accept);
    manager.connect().await.unwrap();
    assert_eq!(transport.opens(), 4);
    assert_eq!(manager.retry_attempt(), 0);
    assert_eq!(manager.status().attempt, 0);
    assert!(manager.status().is_connected());
}

#[tokio::test(start_paused = true)]
async fn retries_use_growing_backoff() {
    let (manager, transport, _sessions) = manager(
        [Step::Fail("refused".into()), Step::Fail("refused".into()), Step::Accept],
        reconnect(1, 5),
    );

    let _ = manager.connect().await;
    let first_retry = manager.retry_at().unwrap();
    // Second retry is at least 2s after the first; stop just past the first.
    tokio::time::sleep_until(first_retry + Duration::from_millis(100)).await;
    assert_eq!(transport.opens(), 2);
    assert_eq!(manager.phase(), PhaseKind::Backoff);

    let second_retry = manager.retry_at().unwrap();
    assert!(second_retry - first_retry > Duration::from_secs(1));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(manager.is_connected());
    assert_eq!(transport.opens(), 3);
}

#[tokio::test(start_paused = true)]
async fn explicit_connect_preempts_backoff_timer() {
    let (manager, transport, _sessions) =
        manager([Step::Fail("refused".into()), Step::Accept], reconnect(10, 5));

    let _ = manager.connect().await;
    assert_eq!(manager.phase(), PhaseKind::Backoff);

    let started = Instant::now();
    manager.connect().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(transport.opens(), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    let (manager, transport, _sessions) = manager([], reconnect(1, 5));

    let _ = manager.connect().await;
    assert_eq!(manager.phase(), PhaseKind::Backoff);
    manager.disconnect();

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(manager.phase(), PhaseKind::Idle);
    assert_eq!(manager.status().status, ConnectionState::Disconnected);
}

// ── Session lifecycle ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rejoins_channels_after_every_reconnect() {
    let (manager, transport, mut sessions) =
        manager([Step::Accept, Step::Accept], reconnect(1, 5));

    manager.connect().await.unwrap();
    let mut first = sessions.recv().await.unwrap();
    let joins = vec![ClientMessage::JoinTenant { tenant_id: 7 }, ClientMessage::JoinAdmin];
    assert_eq!(first.drain_sent(), joins);
    assert_eq!(manager.socket_id().as_deref(), Some("sock-1"));

    first
        .signals
        .send(SessionSignal::Closed(CloseReason::Transport("reset by peer".into())))
        .unwrap();

    let mut second = sessions.recv().await.unwrap();
    assert_eq!(second.sent.recv().await.unwrap(), joins[0]);
    assert_eq!(second.sent.recv().await.unwrap(), joins[1]);
    assert!(manager.is_connected());
    assert_eq!(manager.socket_id().as_deref(), Some("sock-2"));
    assert_eq!(manager.retry_attempt(), 0);
    assert_eq!(transport.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn intentional_server_close_is_not_retried() {
    let (manager, transport, mut sessions) = manager([Step::Accept], reconnect(1, 5));
    manager.connect().await.unwrap();
    let session = sessions.recv().await.unwrap();

    session
        .signals
        .send(SessionSignal::Closed(CloseReason::from_server(
            "io server disconnect",
        )))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(transport.opens(), 1);
    assert_eq!(manager.phase(), PhaseKind::Idle);
    let status = manager.status();
    assert_eq!(status.status, ConnectionState::Disconnected);
    assert_eq!(status.failure, Some(FailureKind::ServerInitiatedDisconnect));
}

#[tokio::test(start_paused = true)]
async fn frames_are_routed_by_category() {
    let (manager, _transport, mut sessions) = manager([Step::Accept], reconnect(1, 5));
    let alarms = support::record_alarms(manager.dispatcher());
    let acks = support::record_acks(manager.dispatcher());
    let errors = support::record_errors(manager.dispatcher());

    manager.connect().await.unwrap();
    let session = sessions.recv().await.unwrap();

    session.push_frame(&support::alarm_frame("alarm:new", 1, "medium"));
    session.push_frame(&support::alarm_frame("alarm:critical", 2, "CRITICAL"));
    session.push_frame(&support::alarm_frame("alarm:new", 3, "catastrophic"));
    session.push_frame(r#"{"event":"alarm:acknowledged","data":{"occurrence_id":2,"acknowledged_by":"ops"}}"#);
    session.push_frame(r#"{"event":"device:sync","data":{}}"#);
    support::settle().await;

    let alarms = alarms.items();
    assert_eq!(alarms.len(), 2);
    assert_eq!(alarms[0].severity, Severity::Medium);
    assert_eq!(alarms[1].severity, Severity::Critical);
    assert_eq!(acks.items().len(), 1);
    assert_eq!(acks.items()[0].acknowledged_by.as_deref(), Some("ops"));

    // Unknown severity and unknown event both land on the error category.
    let kinds: Vec<_> = errors.items().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::InvalidFrame, ErrorKind::InvalidFrame]);
}

#[tokio::test(start_paused = true)]
async fn upgrade_updates_transport_kind_only() {
    let (manager, _transport, mut sessions) = manager([Step::Accept], reconnect(1, 5));
    let statuses = support::record_statuses(manager.dispatcher());
    manager.connect().await.unwrap();
    let session = sessions.recv().await.unwrap();
    assert_eq!(manager.transport_kind(), Some(TransportKind::LongPolling));
    let before = statuses.items().len();

    session
        .signals
        .send(SessionSignal::Upgraded(TransportKind::WebSocket))
        .unwrap();
    support::settle().await;

    assert_eq!(manager.transport_kind(), Some(TransportKind::WebSocket));
    assert_eq!(statuses.items().len(), before);
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn send_requires_a_live_session() {
    let (manager, _transport, mut sessions) = manager([Step::Accept], reconnect(1, 5));
    assert!(manager.send(ClientMessage::JoinAdmin).is_err());

    manager.connect().await.unwrap();
    let mut session = sessions.recv().await.unwrap();
    session.drain_sent();

    manager.send(ClientMessage::JoinAdmin).unwrap();
    assert_eq!(session.drain_sent(), vec![ClientMessage::JoinAdmin]);

    manager.disconnect();
    assert!(session.close.is_cancelled());
    assert!(manager.send(ClientMessage::JoinAdmin).is_err());
}

#[tokio::test(start_paused = true)]
async fn attempts_resolve_the_endpoint_each_time() {
    let (manager, transport, _sessions) =
        manager([Step::Fail("refused".into()), Step::Accept], reconnect(1, 5));

    let _ = manager.connect().await;
    let mut endpoint = (*manager.endpoint()).clone();
    endpoint.push_url = Some(url::Url::parse("wss://standby.test/ws").unwrap());
    manager.set_endpoint(endpoint);
    manager.connect().await.unwrap();

    let endpoints = transport.endpoints();
    assert_eq!(endpoints[0].url.as_str(), "ws://alarms.test/ws");
    assert_eq!(endpoints[1].url.as_str(), "wss://standby.test/ws");
    assert_eq!(endpoints[1].authorization.as_deref(), Some("Bearer s3cret"));
}
