// ── Connection manager ──
//
// Owns the push session lifecycle as one explicit state machine. Every
// transition happens under the state lock; every spawned task carries the
// generation it was started for and is ignored once that generation is gone.
//
//   Idle ──connect──▶ Connecting ──ok──▶ Connected ──lost──▶ Backoff
//                        │  ▲                 │                 │
//                        │  └──────timer──────┼─────────────────┘
//                        └──retries spent──▶ Fatal   (intentional close ▶ Idle)

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use alarmwire_api::{
    ClientMessage, CloseReason, PushEndpoint, PushSession, PushTransport, ServerMessage,
    SessionSignal, TransportKind,
};

use super::{ChannelSubscriber, ConnectionSettings, FrameSink, ReconnectConfig};
use crate::config::EndpointConfig;
use crate::dispatch::EventDispatcher;
use crate::error::{ConnectError, CoreError};
use crate::model::{
    AlarmEvent, ConnectionState, ConnectionStatus, ErrorEvent, ErrorKind, FailureKind,
};

type PendingConnect = Shared<BoxFuture<'static, Result<(), ConnectError>>>;

// ── Phases ───────────────────────────────────────────────────────

/// Where the manager's state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Idle,
    Connecting,
    Connected,
    Backoff,
    Fatal,
}

enum Phase {
    Idle,
    Connecting {
        generation: u64,
        attempt: u32,
        pending: PendingConnect,
        abort: AbortHandle,
    },
    Connected {
        generation: u64,
        session: LiveSession,
    },
    Backoff {
        generation: u64,
        attempt: u32,
        retry_at: Instant,
        timer: CancellationToken,
    },
    Fatal {
        attempts: u32,
    },
}

impl Phase {
    fn kind(&self) -> PhaseKind {
        match self {
            Self::Idle => PhaseKind::Idle,
            Self::Connecting { .. } => PhaseKind::Connecting,
            Self::Connected { .. } => PhaseKind::Connected,
            Self::Backoff { .. } => PhaseKind::Backoff,
            Self::Fatal { .. } => PhaseKind::Fatal,
        }
    }
}

/// The parts of a `PushSession` the manager keeps after handing the
/// inbound receiver to the reader task.
struct LiveSession {
    socket_id: String,
    kind: TransportKind,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    close: CancellationToken,
}

struct State {
    phase: Phase,
    /// Bumped on every transition that invalidates outstanding tasks.
    generation: u64,
}

// ── ConnectionManager ────────────────────────────────────────────

/// Drives a `PushTransport` through connect, rejoin, backoff and give-up.
///
/// Cheaply cloneable via `Arc<Inner>`. At most one connect attempt is ever
/// in flight; concurrent `connect()` callers share its outcome.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn PushTransport>,
    endpoint: ArcSwap<EndpointConfig>,
    token: Option<SecretString>,
    tenant_id: Option<i64>,
    connect_timeout: Duration,
    reconnect: ReconnectConfig,
    subscriber: ChannelSubscriber,
    dispatcher: EventDispatcher,
    state: Mutex<State>,
    /// Authoritative status; only written with the state lock held.
    status_tx: watch::Sender<ConnectionStatus>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("phase", &self.phase())
            .field("tenant_id", &self.inner.tenant_id)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create an idle manager. Nothing happens until [`connect()`](Self::connect).
    pub fn new(
        transport: Arc<dyn PushTransport>,
        settings: ConnectionSettings,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::disconnected(settings.tenant_id));
        Self {
            inner: Arc::new(Inner {
                transport,
                endpoint: ArcSwap::from_pointee(settings.endpoint),
                token: settings.token,
                tenant_id: settings.tenant_id,
                connect_timeout: settings.connect_timeout,
                reconnect: settings.reconnect,
                subscriber: ChannelSubscriber::new(settings.tenant_id, settings.admin_channel),
                dispatcher,
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    generation: 0,
                }),
                status_tx,
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect, or join the attempt already in flight.
    ///
    /// From `Backoff` the pending timer is pre-empted and the retry count
    /// carries over; from `Idle` or `Fatal` the retry budget starts fresh.
    /// Failures are also reported on the status channel and to error
    /// handlers, so callers may ignore the returned error.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let (pending, status) = {
            let mut state = self.inner.lock();
            let resume_from = match &state.phase {
                Phase::Connected { .. } => return Ok(()),
                Phase::Connecting { pending, .. } => Err(pending.clone()),
                Phase::Backoff { attempt, timer, .. } => {
                    timer.cancel();
                    debug!(attempt, "explicit connect pre-empts backoff");
                    Ok(*attempt)
                }
                Phase::Idle | Phase::Fatal { .. } => Ok(0),
            };
            match resume_from {
                Err(pending) => (pending, None),
                Ok(attempt) => {
                    let (pending, status) = self.inner.start_attempt(&mut state, attempt);
                    (pending, Some(status))
                }
            }
        };
        if let Some(status) = status {
            self.inner.announce(status);
        }
        pending.await
    }

    /// Tear down whatever is happening and go idle.
    ///
    /// An in-flight attempt is aborted, a pending retry is cancelled and a
    /// live session is closed. No automatic reconnect follows.
    pub fn disconnect(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        let previous = std::mem::replace(&mut state.phase, Phase::Idle);
        let status = (!matches!(previous, Phase::Idle)).then(|| {
            let status = self.inner.status(ConnectionState::Disconnected);
            self.inner.set_status(&status);
            status
        });
        drop(state);

        match previous {
            Phase::Connecting {
                generation, abort, ..
            } => {
                abort.abort();
                debug!(generation, "in-flight connect abandoned");
            }
            Phase::Connected { session, .. } => {
                session.close.cancel();
                info!(socket_id = %session.socket_id, "push channel disconnected");
            }
            Phase::Backoff { timer, .. } => timer.cancel(),
            Phase::Idle | Phase::Fatal { .. } => {}
        }

        if let Some(status) = status {
            self.inner.announce(status);
        }
    }

    /// Point subsequent attempts at a different server. A live session is
    /// left alone; the new endpoint takes effect on the next attempt.
    pub fn set_endpoint(&self, endpoint: EndpointConfig) {
        self.inner.endpoint.store(Arc::new(endpoint));
    }

    pub fn endpoint(&self) -> Arc<EndpointConfig> {
        self.inner.endpoint.load_full()
    }

    /// Put a frame on the live session.
    pub fn send(&self, message: ClientMessage) -> Result<(), CoreError> {
        self.inner.send_frame(message)
    }

    // ── Introspection ────────────────────────────────────────────

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == PhaseKind::Connected
    }

    pub fn phase(&self) -> PhaseKind {
        self.inner.lock().phase.kind()
    }

    /// Retry count: the attempt in flight or scheduled, the attempts spent
    /// once fatal, and 0 otherwise.
    pub fn retry_attempt(&self) -> u32 {
        match self.inner.lock().phase {
            Phase::Connecting { attempt, .. } | Phase::Backoff { attempt, .. } => attempt,
            Phase::Fatal { attempts } => attempts,
            Phase::Idle | Phase::Connected { .. } => 0,
        }
    }

    /// When the scheduled retry fires, if one is scheduled.
    pub fn retry_at(&self) -> Option<Instant> {
        match self.inner.lock().phase {
            Phase::Backoff { retry_at, .. } => Some(retry_at),
            _ => None,
        }
    }

    pub fn socket_id(&self) -> Option<String> {
        match &self.inner.lock().phase {
            Phase::Connected { session, .. } => Some(session.socket_id.clone()),
            _ => None,
        }
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        match &self.inner.lock().phase {
            Phase::Connected { session, .. } => Some(session.kind),
            _ => None,
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }
}

// ── Transitions ──────────────────────────────────────────────────

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self, status: ConnectionState) -> ConnectionStatus {
        ConnectionStatus::new(status, self.tenant_id)
    }

    /// Record the new status. Call with the state lock held.
    fn set_status(&self, status: &ConnectionStatus) {
        self.status_tx.send_replace(status.clone());
    }

    /// Tell handlers. Call without the state lock: handlers may call back in.
    fn announce(&self, status: ConnectionStatus) {
        self.dispatcher.publish_connection(status);
    }

    fn report(&self, kind: ErrorKind, message: impl Into<String>) {
        self.dispatcher.publish_error(ErrorEvent::new(kind, message));
    }

    fn start_attempt(
        self: &Arc<Self>,
        state: &mut State,
        attempt: u32,
    ) -> (PendingConnect, ConnectionStatus) {
        state.generation += 1;
        let generation = state.generation;

        let task = tokio::spawn(Arc::clone(self).run_attempt(generation, attempt));
        let abort = task.abort_handle();
        let pending = task
            .map(|joined| joined.unwrap_or(Err(ConnectError::Cancelled)))
            .boxed()
            .shared();

        state.phase = Phase::Connecting {
            generation,
            attempt,
            pending: pending.clone(),
            abort,
        };
        debug!(generation, attempt, "connect attempt started");

        let status = self
            .status(ConnectionState::Connecting)
            .with_attempt(attempt);
        self.set_status(&status);
        (pending, status)
    }

    async fn run_attempt(self: Arc<Self>, generation: u64, attempt: u32) -> Result<(), ConnectError> {
        let outcome = self.open_session().await;
        self.settle(generation, attempt, outcome)
    }

    async fn open_session(&self) -> Result<PushSession, ConnectError> {
        let endpoint = self.push_endpoint()?;
        info!(url = %endpoint.url, "opening push session");
        match tokio::time::timeout(self.connect_timeout, self.transport.open(endpoint)).await {
            Ok(result) => result.map_err(ConnectError::from),
            Err(_) => Err(ConnectError::Timeout {
                timeout_secs: self.connect_timeout.as_secs(),
            }),
        }
    }

    /// Resolved fresh for every attempt so `set_endpoint` applies to retries.
    fn push_endpoint(&self) -> Result<PushEndpoint, ConnectError> {
        let url = self
            .endpoint
            .load()
            .resolve_push_url()
            .map_err(|e| ConnectError::InvalidEndpoint(e.to_string()))?;
        Ok(PushEndpoint {
            url,
            authorization: self
                .token
                .as_ref()
                .map(|t| format!("Bearer {}", t.expose_secret())),
        })
    }

    /// Apply an attempt's outcome, unless the attempt has been superseded.
    #[allow(clippy::too_many_lines)]
    fn settle(
        self: &Arc<Self>,
        generation: u64,
        attempt: u32,
        outcome: Result<PushSession, ConnectError>,
    ) -> Result<(), ConnectError> {
        let mut state = self.lock();
        let current = matches!(
            state.phase,
            Phase::Connecting { generation: g, .. } if g == generation
        );
        if !current {
            drop(state);
            if let Ok(session) = outcome {
                debug!(socket_id = %session.socket_id, "closing session from abandoned attempt");
                session.close.cancel();
            }
            return Err(ConnectError::Cancelled);
        }

        match outcome {
            Ok(session) => {
                let PushSession {
                    socket_id,
                    kind,
                    outbound,
                    inbound,
                    close,
                } = session;

                let mut status = self.status(ConnectionState::Connected);
                status.socket_id = Some(socket_id.clone());
                status.transport = Some(kind);
                self.set_status(&status);
                state.phase = Phase::Connected {
                    generation,
                    session: LiveSession {
                        socket_id: socket_id.clone(),
                        kind,
                        outbound,
                        close,
                    },
                };
                drop(state);

                info!(%socket_id, transport = %kind, "push channel connected");
                self.announce(status);
                self.rejoin_channels();
                tokio::spawn(read_session(Arc::downgrade(self), generation, inbound));
                Ok(())
            }
            Err(err) => {
                let failures = attempt.saturating_add(1);
                let kind = err.failure_kind().unwrap_or(FailureKind::TransportError);

                if failures > self.reconnect.max_retries {
                    let fatal = ConnectError::MaxRetriesExceeded {
                        attempts: failures,
                        last: err.to_string(),
                    };
                    state.phase = Phase::Fatal { attempts: failures };
                    let status = self
                        .status(ConnectionState::Error)
                        .with_failure(FailureKind::MaxRetriesExceeded, fatal.to_string())
                        .with_attempt(failures);
                    self.set_status(&status);
                    drop(state);

                    warn!(attempts = failures, error = %err, "giving up on push channel");
                    self.announce(status);
                    self.report(kind.into(), err.to_string());
                    self.report(ErrorKind::MaxRetriesExceeded, fatal.to_string());
                    Err(fatal)
                } else {
                    let delay = self.reconnect.delay_for(attempt);
                    self.schedule_retry(&mut state, failures, delay);
                    let status = self
                        .status(ConnectionState::Error)
                        .with_failure(kind, err.to_string())
                        .with_attempt(failures);
                    self.set_status(&status);
                    drop(state);

                    warn!(attempt, error = %err, retry_in = ?delay, "connect attempt failed");
                    self.announce(status);
                    self.report(kind.into(), err.to_string());
                    Err(err)
                }
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, state: &mut State, attempt: u32, delay: Duration) {
        state.generation += 1;
        let generation = state.generation;
        let timer = CancellationToken::new();
        state.phase = Phase::Backoff {
            generation,
            attempt,
            retry_at: Instant::now() + delay,
            timer: timer.clone(),
        };
        tokio::spawn(retry_after(Arc::downgrade(self), generation, delay, timer));
    }

    fn retry_due(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock();
        let Phase::Backoff {
            generation: scheduled,
            attempt,
            ..
        } = state.phase
        else {
            return;
        };
        if scheduled != generation {
            return;
        }
        debug!(attempt, "backoff elapsed, retrying");
        let (_pending, status) = self.start_attempt(&mut state, attempt);
        drop(state);
        self.announce(status);
    }

    fn rejoin_channels(&self) {
        for (join, err) in self.subscriber.join_all(self) {
            self.report(ErrorKind::ChannelJoin, format!("{join:?}: {err}"));
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        matches!(
            self.lock().phase,
            Phase::Connected { generation: g, .. } if g == generation
        )
    }

    // ── Session events ───────────────────────────────────────────

    fn route(&self, message: ServerMessage) {
        trace!(event = message.event_name(), "push frame");
        match message {
            ServerMessage::AlarmNew(payload) | ServerMessage::AlarmCritical(payload) => {
                match AlarmEvent::try_from(payload) {
                    Ok(alarm) => {
                        self.dispatcher.publish_alarm(alarm);
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping unusable alarm frame");
                        self.report(ErrorKind::InvalidFrame, e.to_string());
                    }
                }
            }
            ServerMessage::AlarmAcknowledged(payload) => {
                self.dispatcher.publish_acknowledgment(payload.into());
            }
        }
    }

    fn note_upgrade(&self, generation: u64, kind: TransportKind) {
        let mut state = self.lock();
        if let Phase::Connected {
            generation: g,
            session,
        } = &mut state.phase
        {
            if *g == generation {
                session.kind = kind;
                info!(socket_id = %session.socket_id, transport = %kind, "push transport upgraded");
            }
        }
    }

    fn session_closed(self: &Arc<Self>, generation: u64, reason: &CloseReason) {
        let mut state = self.lock();
        if !matches!(state.phase, Phase::Connected { generation: g, .. } if g == generation) {
            return;
        }

        if let CloseReason::Server {
            intentional: true, ..
        } = reason
        {
            state.generation += 1;
            state.phase = Phase::Idle;
            let status = self
                .status(ConnectionState::Disconnected)
                .with_failure(FailureKind::ServerInitiatedDisconnect, reason.to_string());
            self.set_status(&status);
            drop(state);

            info!(%reason, "server ended the session; not reconnecting");
            self.announce(status);
            self.report(ErrorKind::ServerInitiatedDisconnect, reason.to_string());
            return;
        }

        let kind = match reason {
            CloseReason::Server { .. } => FailureKind::ServerInitiatedDisconnect,
            CloseReason::Transport(_) | CloseReason::Client => FailureKind::TransportError,
        };
        let delay = self.reconnect.delay_for(0);
        self.schedule_retry(&mut state, 0, delay);
        let status = self
            .status(ConnectionState::Disconnected)
            .with_failure(kind, reason.to_string());
        self.set_status(&status);
        drop(state);

        warn!(%reason, retry_in = ?delay, "push session lost");
        self.announce(status);
        self.report(kind.into(), reason.to_string());
    }
}

impl FrameSink for Inner {
    fn send_frame(&self, message: ClientMessage) -> Result<(), CoreError> {
        let state = self.lock();
        match &state.phase {
            Phase::Connected { session, .. } => session
                .outbound
                .send(message)
                .map_err(|_| CoreError::NotConnected),
            _ => Err(CoreError::NotConnected),
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn retry_after(inner: Weak<Inner>, generation: u64, delay: Duration, timer: CancellationToken) {
    tokio::select! {
        () = timer.cancelled() => {}
        () = tokio::time::sleep(delay) => {
            if let Some(inner) = inner.upgrade() {
                inner.retry_due(generation);
            }
        }
    }
}

async fn read_session(
    inner: Weak<Inner>,
    generation: u64,
    mut inbound: mpsc::UnboundedReceiver<SessionSignal>,
) {
    let reason = loop {
        let Some(signal) = inbound.recv().await else {
            break CloseReason::Transport("session ended without a close".into());
        };
        let Some(manager) = inner.upgrade() else {
            return;
        };
        match signal {
            SessionSignal::Message(message) => {
                if manager.is_current(generation) {
                    manager.route(message);
                }
            }
            SessionSignal::Rejected(err) => {
                warn!(error = %err, "push frame rejected");
                manager.report(ErrorKind::InvalidFrame, err.to_string());
            }
            SessionSignal::Upgraded(kind) => manager.note_upgrade(generation, kind),
            SessionSignal::Closed(reason) => break reason,
        }
    };

    if let Some(manager) = inner.upgrade() {
        manager.session_closed(generation, &reason);
    }
}
