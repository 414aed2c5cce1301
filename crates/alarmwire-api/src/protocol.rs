// Push channel frame codec
//
// Every frame on the push channel is a JSON text message shaped
// `{ "event": "<name>", "data": { ... } }`. Inbound frames decode into the
// closed `ServerMessage` enum: unknown event names and malformed payloads are
// rejected here, so nothing untyped crosses into business logic.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Inbound payloads ─────────────────────────────────────────────────

/// Alarm occurrence as pushed by the server on `alarm:new` / `alarm:critical`.
///
/// The server is loose about numeric vs string ids and about which optional
/// fields it fills, so ids accept both and most fields default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmPayload {
    #[serde(deserialize_with = "integer_id")]
    pub occurrence_id: i64,
    #[serde(default, deserialize_with = "optional_integer_id")]
    pub rule_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_integer_id")]
    pub tenant_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_string_id")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "optional_integer_id")]
    pub point_id: Option<i64>,
    #[serde(default)]
    pub message: String,
    /// `"critical"`, `"HIGH"`, ... (case varies by server version).
    pub severity: String,
    /// Redundant 0..=4 rank; absent on older servers.
    #[serde(default)]
    pub severity_level: Option<u8>,
    #[serde(default)]
    pub state: Option<String>,
    /// ISO-8601 string or epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub trigger_value: Option<serde_json::Value>,
}

/// Acknowledgment pushed on `alarm:acknowledged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    #[serde(deserialize_with = "integer_id")]
    pub occurrence_id: i64,
    #[serde(default, deserialize_with = "optional_string_id")]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

// ── ServerMessage ────────────────────────────────────────────────────

/// A decoded inbound push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `alarm:new`
    AlarmNew(AlarmPayload),
    /// `alarm:critical` (same payload, sent for severity >= high)
    AlarmCritical(AlarmPayload),
    /// `alarm:acknowledged`
    AlarmAcknowledged(AckPayload),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ServerMessage {
    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::AlarmNew(_) => "alarm:new",
            Self::AlarmCritical(_) => "alarm:critical",
            Self::AlarmAcknowledged(_) => "alarm:acknowledged",
        }
    }

    /// Decode a text frame. Fails closed on unknown events and bad shapes.
    pub fn decode(text: &str) -> Result<Self, Error> {
        let frame: RawFrame = serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: format!("invalid frame envelope: {e}"),
            body: text.to_owned(),
        })?;

        let shape_err = |e: serde_json::Error| Error::Deserialization {
            message: format!("invalid '{}' payload: {e}", frame.event),
            body: text.to_owned(),
        };

        match frame.event.as_str() {
            "alarm:new" => serde_json::from_value(frame.data.clone())
                .map(Self::AlarmNew)
                .map_err(shape_err),
            "alarm:critical" => serde_json::from_value(frame.data.clone())
                .map(Self::AlarmCritical)
                .map_err(shape_err),
            "alarm:acknowledged" => serde_json::from_value(frame.data.clone())
                .map(Self::AlarmAcknowledged)
                .map_err(shape_err),
            other => Err(Error::UnknownEvent(other.to_owned())),
        }
    }
}

// ── ClientMessage ────────────────────────────────────────────────────

/// An outbound push frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the tenant-scoped alarm room.
    JoinTenant { tenant_id: i64 },
    /// Join the administrative broadcast room.
    JoinAdmin,
    /// Acknowledge an occurrence on behalf of a user.
    AcknowledgeAlarm {
        occurrence_id: i64,
        user_id: String,
        comment: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl ClientMessage {
    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Deserialization {
            message: format!("failed to encode frame: {e}"),
            body: String::new(),
        })
    }
}

// ── Lenient id helpers ───────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

fn integer_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match RawId::deserialize(deserializer)? {
        RawId::Int(n) => Ok(n),
        RawId::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected integer id, got '{s}'"))),
    }
}

fn optional_integer_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Int(n)) => Ok(Some(n)),
        Some(RawId::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(RawId::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected integer id, got '{s}'"))),
    }
}

fn optional_string_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Option::<RawId>::deserialize(deserializer)? {
        None => None,
        Some(RawId::Int(n)) => Some(n.to_string()),
        Some(RawId::Str(s)) => Some(s),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
