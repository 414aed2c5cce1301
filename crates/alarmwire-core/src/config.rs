// ── Runtime monitor configuration ──
//
// These types describe *how* to reach an alarm server and how the live
// view behaves. They carry the bearer token and tuning knobs but never
// touch disk; the CLI builds a `MonitorConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use alarmwire_api::transport::{TlsMode, TransportConfig};

use crate::connection::ReconnectConfig;
use crate::error::CoreError;
use crate::view::ViewConfig;

/// Default size of the page used to seed the alarm counts.
pub const DEFAULT_SNAPSHOT_LIMIT: u32 = 1000;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed plant servers).
    DangerAcceptInvalid,
}

/// Where the push channel and REST API live.
///
/// Resolved once per connection attempt, so a swapped endpoint takes effect
/// on the next reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Explicit push-channel URL (`ws://` / `wss://`). Highest priority.
    pub push_url: Option<Url>,
    /// REST API base URL. Also the push fallback.
    pub api_url: Option<Url>,
    /// Origin the dashboard was served from; last-resort default.
    pub origin: Option<Url>,
}

impl EndpointConfig {
    /// Push-channel URL: explicit push URL, then the API base mapped onto
    /// `ws(s)://host/ws`, then the same mapping of the origin.
    pub fn resolve_push_url(&self) -> Result<Url, CoreError> {
        if let Some(url) = &self.push_url {
            return Ok(url.clone());
        }
        let base = self
            .api_url
            .as_ref()
            .or(self.origin.as_ref())
            .ok_or_else(|| CoreError::Config {
                message: "no push URL, API URL or origin configured".into(),
            })?;
        websocket_url(base)
    }

    /// REST base URL: explicit API URL, else the origin.
    pub fn resolve_api_url(&self) -> Result<Url, CoreError> {
        self.api_url
            .as_ref()
            .or(self.origin.as_ref())
            .cloned()
            .ok_or_else(|| CoreError::Config {
                message: "no API URL or origin configured".into(),
            })
    }
}

/// Map an HTTP(S) base onto the push path on the same host.
fn websocket_url(base: &Url) -> Result<Url, CoreError> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CoreError::Config {
                message: format!("unsupported URL scheme '{other}' in {base}"),
            });
        }
    };
    let host = base.host_str().ok_or_else(|| CoreError::Config {
        message: format!("URL has no host: {base}"),
    })?;
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    Url::parse(&format!("{scheme}://{authority}/ws")).map_err(|e| CoreError::Config {
        message: format!("invalid push URL derived from {base}: {e}"),
    })
}

/// Configuration for one alarm monitor.
///
/// Built by the CLI, passed to `AlarmMonitor`.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub endpoint: EndpointConfig,
    /// Bearer token for REST calls and the push upgrade.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// REST request timeout.
    pub timeout: Duration,
    /// Tenant channel to join; `None` skips the tenant join.
    pub tenant_id: Option<i64>,
    /// Sent with acknowledgments.
    pub user_id: String,
    /// Join the administrative broadcast channel.
    pub admin_channel: bool,
    /// Hard bound on a single connect attempt.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub view: ViewConfig,
    /// Page size of the count-seeding snapshot query.
    pub snapshot_limit: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            tenant_id: None,
            user_id: "operator".into(),
            admin_channel: true,
            connect_timeout: Duration::from_secs(20),
            reconnect: ReconnectConfig::default(),
            view: ViewConfig::default(),
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }
}

impl MonitorConfig {
    /// Transport settings shared by the REST client and push upgrade.
    pub fn transport_config(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }
}
