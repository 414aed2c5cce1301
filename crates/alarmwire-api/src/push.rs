// Push transport abstraction
//
// The connection manager in alarmwire-core drives any `PushTransport`: the
// WebSocket implementation in this crate, or a scripted one in tests. A
// transport only knows how to open a single session; reconnection policy
// lives above it.

use std::fmt;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::protocol::{ClientMessage, ServerMessage};

/// Close reason a server sends when it deliberately ends a session.
/// Sessions closed this way are not retried.
pub const INTENTIONAL_SERVER_CLOSE: &str = "io server disconnect";

/// Resolved target for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEndpoint {
    pub url: Url,
    /// Full `Authorization` header value, if any.
    pub authorization: Option<String>,
}

/// Capability level of the underlying session transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    LongPolling,
    WebSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LongPolling => "long-polling",
            Self::WebSocket => "websocket",
        })
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed the session; `intentional` means it asked us not
    /// to come back on our own.
    Server { reason: String, intentional: bool },
    /// The socket failed underneath us.
    Transport(String),
    /// We closed it.
    Client,
}

impl CloseReason {
    /// Build a server close, classifying the well-known intentional reason.
    pub fn from_server(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let intentional = reason == INTENTIONAL_SERVER_CLOSE;
        Self::Server { reason, intentional }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { reason, .. } if reason.is_empty() => f.write_str("server closed"),
            Self::Server { reason, .. } => write!(f, "server closed: {reason}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Client => f.write_str("client closed"),
        }
    }
}

/// Everything a live session reports upward.
#[derive(Debug)]
pub enum SessionSignal {
    /// A decoded inbound frame.
    Message(ServerMessage),
    /// An inbound frame that failed to decode (already rejected).
    Rejected(Error),
    /// The session moved to a more capable transport. Diagnostic only.
    Upgraded(TransportKind),
    /// The session is over. Always the last signal.
    Closed(CloseReason),
}

/// A single open session on the push channel.
///
/// Dropping the `outbound` sender or cancelling `close` ends the session.
#[derive(Debug)]
pub struct PushSession {
    pub socket_id: String,
    pub kind: TransportKind,
    pub outbound: mpsc::UnboundedSender<ClientMessage>,
    pub inbound: mpsc::UnboundedReceiver<SessionSignal>,
    pub close: CancellationToken,
}

/// Something that can open push sessions.
///
/// `open` must resolve once the session is usable (handshake complete) and
/// must be cancel-safe: dropping the future abandons the attempt.
pub trait PushTransport: Send + Sync + 'static {
    fn open(&self, endpoint: PushEndpoint) -> BoxFuture<'static, Result<PushSession, Error>>;
}
