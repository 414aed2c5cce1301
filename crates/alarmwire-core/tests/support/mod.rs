// Shared fixtures for alarmwire-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use alarmwire_api::{
    ClientMessage, PushEndpoint, PushSession, PushTransport, ServerMessage, SessionSignal,
    TransportKind,
};
use alarmwire_core::{
    ConnectionSettings, EndpointConfig, EventDispatcher, ReconnectConfig, Subscription,
};

// ── Scripted transport ───────────────────────────────────────────

/// What the next `open()` does.
#[derive(Debug, Clone)]
pub enum Step {
    Fail(String),
    /// Never resolves; only the connect timeout or an abort ends it.
    Hang,
    Accept,
    AcceptAfter(Duration),
}

/// Test side of an accepted session.
pub struct SessionHandle {
    pub socket_id: String,
    pub sent: mpsc::UnboundedReceiver<ClientMessage>,
    pub signals: mpsc::UnboundedSender<SessionSignal>,
    pub close: CancellationToken,
}

impl SessionHandle {
    /// Frames the client has sent so far.
    pub fn drain_sent(&mut self) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.sent.try_recv() {
            out.push(msg);
        }
        out
    }

    pub fn push_frame(&self, json: &str) {
        let signal = match ServerMessage::decode(json) {
            Ok(msg) => SessionSignal::Message(msg),
            Err(e) => SessionSignal::Rejected(e),
        };
        self.signals.send(signal).unwrap();
    }
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements `in_flight` however the open future ends: resolved,
/// timed out, or aborted.
struct InFlight(Arc<Counters>);

impl InFlight {
    fn enter(counters: Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    counters: Arc<Counters>,
    endpoints: Mutex<Vec<PushEndpoint>>,
    sessions: mpsc::UnboundedSender<SessionHandle>,
}

impl ScriptedTransport {
    /// Once the script runs out every open fails.
    pub fn new(
        steps: impl IntoIterator<Item = Step>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionHandle>) {
        let (sessions, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            counters: Arc::default(),
            endpoints: Mutex::new(Vec::new()),
            sessions,
        });
        (transport, rx)
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<PushEndpoint> {
        self.endpoints.lock().unwrap().clone()
    }
}

impl PushTransport for ScriptedTransport {
    fn open(
        &self,
        endpoint: PushEndpoint,
    ) -> BoxFuture<'static, Result<PushSession, alarmwire_api::Error>> {
        let n = self.counters.opens.fetch_add(1, Ordering::SeqCst) + 1;
        self.endpoints.lock().unwrap().push(endpoint);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Fail("script exhausted".into()));
        let guard = InFlight::enter(Arc::clone(&self.counters));
        let sessions = self.sessions.clone();

        async move {
            let _guard = guard;
            match step {
                Step::Fail(reason) => Err(alarmwire_api::Error::WebSocketConnect(reason)),
                Step::Hang => futures_util::future::pending().await,
                Step::Accept => Ok(accept(n, &sessions)),
                Step::AcceptAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(accept(n, &sessions))
                }
            }
        }
        .boxed()
    }
}

fn accept(n: usize, sessions: &mpsc::UnboundedSender<SessionHandle>) -> PushSession {
    let socket_id = format!("sock-{n}");
    let (outbound, sent) = mpsc::unbounded_channel();
    let (signals, inbound) = mpsc::unbounded_channel();
    let close = CancellationToken::new();
    let _ = sessions.send(SessionHandle {
        socket_id: socket_id.clone(),
        sent,
        signals,
        close: close.clone(),
    });
    PushSession {
        socket_id,
        kind: TransportKind::LongPolling,
        outbound,
        inbound,
        close,
    }
}

// ── Settings & recorders ─────────────────────────────────────────

pub fn settings(reconnect: ReconnectConfig) -> ConnectionSettings {
    ConnectionSettings {
        endpoint: EndpointConfig {
            push_url: Some(Url::parse("ws://alarms.test/ws").unwrap()),
            ..EndpointConfig::default()
        },
        token: Some(secrecy::SecretString::from("s3cret".to_owned())),
        tenant_id: Some(7),
        admin_channel: true,
        connect_timeout: Duration::from_secs(20),
        reconnect,
    }
}

/// Collects everything one dispatcher category delivers.
pub struct Recorder<T> {
    items: Arc<Mutex<Vec<T>>>,
    _subscription: Subscription,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn items(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }
}

macro_rules! recorder {
    ($name:ident, $method:ident, $ty:ty) => {
        pub fn $name(dispatcher: &EventDispatcher) -> Recorder<$ty> {
            let items = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&items);
            let subscription = dispatcher.$method(move |item: &$ty| {
                sink.lock().unwrap().push(item.clone());
                Ok(())
            });
            Recorder {
                items,
                _subscription: subscription,
            }
        }
    };
}

recorder!(record_alarms, on_alarm, alarmwire_core::AlarmEvent);
recorder!(record_acks, on_acknowledgment, alarmwire_core::Acknowledgment);
recorder!(record_statuses, on_connection_change, alarmwire_core::ConnectionStatus);
recorder!(record_errors, on_error, alarmwire_core::ErrorEvent);

/// Let spawned tasks drain their queues. Time is paused in these tests, so
/// this returns as soon as every task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn alarm_frame(event: &str, occurrence_id: i64, severity: &str) -> String {
    alarm_frame_in_state(event, occurrence_id, severity, "active")
}

pub fn alarm_frame_in_state(event: &str, occurrence_id: i64, severity: &str, state: &str) -> String {
    serde_json::json!({
        "event": event,
        "data": {
            "occurrence_id": occurrence_id,
            "tenant_id": 7,
            "message": format!("alarm {occurrence_id}"),
            "severity": severity,
            "state": state,
            "timestamp": "2026-03-01T08:15:00Z",
        }
    })
    .to_string()
}
