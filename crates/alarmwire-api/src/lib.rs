// alarmwire-api: wire-level client for the alarm server (push channel + REST)

pub mod error;
pub mod protocol;
pub mod push;
pub mod rest;
pub mod tls;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use protocol::{AckPayload, AlarmPayload, ClientMessage, ServerMessage};
pub use push::{CloseReason, PushEndpoint, PushSession, PushTransport, SessionSignal, TransportKind};
pub use rest::{AlarmClient, AlarmPage, AlarmQuery, Pagination};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::WebSocketTransport;
