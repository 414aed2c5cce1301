use thiserror::Error;

/// Top-level error type for the `alarmwire-api` crate.
///
/// Covers every failure mode of the wire layer: HTTP transport, REST
/// envelopes, the push-channel WebSocket, and frame decoding.
/// `alarmwire-core` maps these into domain diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// reqwest could not complete the request.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid alarm server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or connect attempt timed out.
    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// CA bundle could not be read or the handshake was rejected.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Unsuccessful response from the alarm REST API.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The server rejected the bearer token.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Push channel ────────────────────────────────────────────────
    /// The push-channel upgrade did not complete.
    #[error("Push channel connect failed: {0}")]
    WebSocketConnect(String),

    /// The server closed the push channel.
    #[error("Push channel closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// A frame named an event this client does not understand.
    #[error("Unknown push event '{0}'")]
    UnknownEvent(String),

    /// No live session to send an outbound frame on.
    #[error("Push channel is not connected")]
    NotConnected,

    // ── Data ────────────────────────────────────────────────────────
    /// A response or frame did not match the expected shape. `body` keeps
    /// the raw text for `--verbose` output.
    #[error("Malformed server payload: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Network-level failures that a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }

    /// The server refused the bearer token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Api { status: 401, .. })
    }

    /// The occurrence (or endpoint) does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status: 404, .. } => true,
            Self::Transport(e) => matches!(e.status(), Some(reqwest::StatusCode::NOT_FOUND)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_failures_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(Error::Timeout { timeout_secs: 20 }.is_transient());
        assert!(!Error::UnknownEvent("alarm:bogus".into()).is_transient());
    }

    #[test]
    fn api_404_is_not_found() {
        let err = Error::Api {
            status: 404,
            message: "occurrence 7 not found".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_auth_failure());
    }
}
