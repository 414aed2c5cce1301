//! WebSocket push transport.
//!
//! Opens one WebSocket session to the alarm server's push endpoint and pumps
//! frames in both directions on a background task. Inbound text frames are
//! decoded into [`ServerMessage`](crate::protocol::ServerMessage) right here;
//! anything that fails to decode is surfaced as
//! [`SessionSignal::Rejected`] and never forwarded as data.
//!
//! Reconnection is not handled here -- the connection manager in
//! `alarmwire-core` owns retry policy and simply calls
//! [`PushTransport::open`] again.
//!
//! [`WebSocketTransport::with_tls`] applies a profile's CA file or
//! accept-invalid setting to `wss://` upgrades. [`WebSocketTransport::new`]
//! trusts the bundled web PKI roots.
//!
//! # Example
//!
//! ```rust,ignore
//! use alarmwire_api::{PushEndpoint, PushTransport, TlsMode, WebSocketTransport};
//!
//! let transport = WebSocketTransport::with_tls(&TlsMode::System)?;
//! let endpoint = PushEndpoint {
//!     url: "wss://plant.example.com/ws".parse()?,
//!     authorization: None,
//! };
//! let mut session = transport.open(endpoint).await?;
//! while let Some(signal) = session.inbound.recv().await {
//!     println!("{signal:?}");
//! }
//! ```

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::push::{CloseReason, PushEndpoint, PushSession, PushTransport, SessionSignal, TransportKind};
use crate::tls;
use crate::transport::TlsMode;

/// [`PushTransport`] backed by `tokio-tungstenite`.
#[derive(Clone, Default)]
pub struct WebSocketTransport {
    /// `None` uses tokio-tungstenite's bundled web PKI roots.
    connector: Option<Connector>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("custom_tls", &self.connector.is_some())
            .finish()
    }
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the same TLS mode the REST client uses to `wss://` upgrades.
    pub fn with_tls(mode: &TlsMode) -> Result<Self, Error> {
        let connector = tls::push_client_config(mode)?.map(Connector::Rustls);
        Ok(Self { connector })
    }

    pub fn has_custom_tls(&self) -> bool {
        self.connector.is_some()
    }
}

impl PushTransport for WebSocketTransport {
    fn open(&self, endpoint: PushEndpoint) -> BoxFuture<'static, Result<PushSession, Error>> {
        open_session(endpoint, self.connector.clone()).boxed()
    }
}

// ── Session setup ────────────────────────────────────────────────────

async fn open_session(
    endpoint: PushEndpoint,
    connector: Option<Connector>,
) -> Result<PushSession, Error> {
    info!(url = %endpoint.url, "connecting push channel");

    let uri: tungstenite::http::Uri = endpoint
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(auth) = endpoint.authorization {
        request = request.with_header("Authorization", auth);
    }

    let (ws_stream, _response) =
        tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let socket_id = uuid::Uuid::new_v4().to_string();
    info!(socket_id, "push channel connected");

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let close = CancellationToken::new();

    tokio::spawn(pump(ws_stream, outbound_rx, inbound_tx, close.clone()));

    Ok(PushSession {
        socket_id,
        kind: TransportKind::WebSocket,
        outbound: outbound_tx,
        inbound: inbound_rx,
        close,
    })
}

// ── Frame pump ───────────────────────────────────────────────────────

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Shovel frames until either side ends the session, then report why.
async fn pump(
    ws_stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    inbound: mpsc::UnboundedSender<SessionSignal>,
    close: CancellationToken,
) {
    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            biased;
            () = close.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                break CloseReason::Client;
            }
            msg = outbound.recv() => {
                let Some(msg) = msg else {
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    break CloseReason::Client;
                };
                match msg.encode() {
                    Ok(text) => {
                        trace!(%text, "push frame out");
                        if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                            break CloseReason::Transport(e.to_string());
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping unencodable outbound frame"),
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        trace!(text = %text.as_str(), "push frame in");
                        let signal = match ServerMessage::decode(text.as_str()) {
                            Ok(msg) => SessionSignal::Message(msg),
                            Err(e) => {
                                debug!(error = %e, "rejected push frame");
                                SessionSignal::Rejected(e)
                            }
                        };
                        if inbound.send(signal).is_err() {
                            // Nobody is listening any more.
                            break CloseReason::Client;
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        trace!("push channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let reason = frame
                            .as_ref()
                            .map(|cf| cf.reason.as_str().to_owned())
                            .unwrap_or_default();
                        if let Some(cf) = frame {
                            info!(code = u16::from(cf.code), reason = %reason, "push close frame received");
                        }
                        break CloseReason::from_server(reason);
                    }
                    Some(Err(e)) => break CloseReason::Transport(e.to_string()),
                    None => break CloseReason::Transport("stream ended".into()),
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    };

    debug!(%reason, "push session ended");
    let _ = inbound.send(SessionSignal::Closed(reason));
}
