// ── Push-channel connection ──
//
// Session lifecycle (manager), per-session room joins (subscriber) and the
// reconnect policy (backoff).

mod backoff;
mod manager;
mod subscriber;

use std::time::Duration;

use secrecy::SecretString;

use crate::config::{EndpointConfig, MonitorConfig};

pub use backoff::ReconnectConfig;
pub use manager::{ConnectionManager, PhaseKind};
pub use subscriber::{ChannelSubscriber, FrameSink};

/// Everything the connection manager needs from the monitor config.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: EndpointConfig,
    pub token: Option<SecretString>,
    pub tenant_id: Option<i64>,
    pub admin_channel: bool,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for ConnectionSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            tenant_id: config.tenant_id,
            admin_channel: config.admin_channel,
            connect_timeout: config.connect_timeout,
            reconnect: config.reconnect.clone(),
        }
    }
}
