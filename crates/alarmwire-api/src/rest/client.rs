// Alarm REST API HTTP client
//
// Wraps `reqwest::Client` with URL construction under `{base}/api/` and
// envelope unwrapping. Endpoint methods live in `alarms.rs` to keep this
// module focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::rest::models::ApiResponse;
use crate::transport::TransportConfig;

/// Raw HTTP client for the alarm server's REST API.
///
/// Handles the `{ success, data, message }` envelope. All methods return
/// the unwrapped `data` payload.
#[derive(Debug, Clone)]
pub struct AlarmClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AlarmClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://plant.example.com:3000`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request with query parameters and unwrap the envelope.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(Error::Transport)?;

        self.parse_envelope(resp).await
    }

    /// Send a POST request whose response carries no meaningful `data`.
    pub(crate) async fn post_action(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        self.unwrap_envelope::<serde_json::Value>(resp).await.map(|_| ())
    }

    /// Parse the envelope and require a `data` payload.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let (data, body) = self.unwrap_envelope(resp).await?;
        data.ok_or_else(|| Error::Deserialization {
            message: "response envelope has no data".into(),
            body,
        })
    }

    /// Parse the `{ success, data }` envelope. Non-2xx statuses and
    /// `success: false` both become `Error::Api`.
    async fn unwrap_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<(Option<T>, String), Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "token missing, expired, or rejected".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(Error::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }
            Err(e) => {
                return Err(Error::Deserialization {
                    message: e.to_string(),
                    body,
                });
            }
        };

        if !status.is_success() || !envelope.success {
            return Err(Error::Api {
                status: status.as_u16(),
                message: envelope
                    .message
                    .or(envelope.error)
                    .unwrap_or_else(|| format!("request failed with HTTP {status}")),
            });
        }

        Ok((envelope.data, body))
    }
}
