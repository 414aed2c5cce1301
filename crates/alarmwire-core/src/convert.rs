// ── Wire-to-domain conversions ──
//
// Bridges `alarmwire_api` payloads into `crate::model` types. Conversions
// fail closed: an unrecognized severity or state rejects the whole payload
// rather than guessing.

use chrono::{DateTime, Utc};
use serde_json::Value;

use alarmwire_api::{AckPayload, AlarmPayload};

use crate::error::CoreError;
use crate::model::{Acknowledgment, AlarmEvent, AlarmState, OccurrenceId, Severity, TriggerValue};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse an ISO-8601 string or epoch milliseconds. Anything else (or
/// nothing) falls back to the time of receipt.
fn parse_timestamp(raw: Option<&Value>) -> DateTime<Utc> {
    let parsed = match raw {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.unwrap_or_else(Utc::now)
}

fn parse_trigger_value(raw: Option<Value>) -> Option<TriggerValue> {
    match raw? {
        Value::Null => None,
        Value::Bool(b) => Some(TriggerValue::Bool(b)),
        Value::Number(n) => n.as_f64().map(TriggerValue::Number),
        Value::String(s) => Some(TriggerValue::Text(s)),
        other => Some(TriggerValue::Text(other.to_string())),
    }
}

/// Severity from its name, falling back to the numeric rank when the name
/// is missing.
fn parse_severity(name: &str, level: Option<u8>) -> Result<Severity, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return level
            .and_then(Severity::from_rank)
            .ok_or_else(|| CoreError::InvalidPayload {
                message: "alarm has no severity".into(),
            });
    }
    name.parse().map_err(|_| CoreError::InvalidPayload {
        message: format!("unknown severity '{name}'"),
    })
}

fn parse_state(raw: Option<&str>) -> Result<AlarmState, CoreError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(AlarmState::Active),
        Some(s) => s.parse().map_err(|_| CoreError::InvalidPayload {
            message: format!("unknown alarm state '{s}'"),
        }),
    }
}

// ── Alarm ──────────────────────────────────────────────────────────

impl TryFrom<AlarmPayload> for AlarmEvent {
    type Error = CoreError;

    fn try_from(p: AlarmPayload) -> Result<Self, Self::Error> {
        let severity = parse_severity(&p.severity, p.severity_level)?;
        let state = parse_state(p.state.as_deref())?;

        if let Some(level) = p.severity_level.filter(|l| *l != severity.rank()) {
            tracing::debug!(
                occurrence_id = p.occurrence_id,
                level,
                %severity,
                "severity_level disagrees with severity name; using name"
            );
        }

        Ok(AlarmEvent {
            occurrence_id: OccurrenceId(p.occurrence_id),
            rule_id: p.rule_id,
            tenant_id: p.tenant_id,
            device_id: p.device_id,
            point_id: p.point_id,
            message: p.message,
            severity,
            severity_level: severity.rank(),
            state,
            timestamp: parse_timestamp(p.timestamp.as_ref()),
            source_name: p.source_name,
            location: p.location,
            trigger_value: parse_trigger_value(p.trigger_value),
        })
    }
}

// ── Acknowledgment ─────────────────────────────────────────────────

impl From<AckPayload> for Acknowledgment {
    fn from(p: AckPayload) -> Self {
        Acknowledgment {
            occurrence_id: OccurrenceId(p.occurrence_id),
            acknowledged_by: p.acknowledged_by,
            comment: p.comment,
            timestamp: parse_timestamp(p.timestamp.as_ref()),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn payload(value: Value) -> AlarmPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn converts_full_payload() {
        let p = payload(json!({
            "occurrence_id": 12,
            "rule_id": 4,
            "tenant_id": 1,
            "device_id": 7,
            "point_id": 30,
            "message": "Tank level low",
            "severity": "MEDIUM",
            "severity_level": 2,
            "state": "ACTIVE",
            "timestamp": "2026-03-01T08:15:00Z",
            "source_name": "Tank-1",
            "location": "Yard",
            "trigger_value": 3.5
        }));

        let alarm = AlarmEvent::try_from(p).unwrap();
        assert_eq!(alarm.occurrence_id, OccurrenceId(12));
        assert_eq!(alarm.device_id.as_deref(), Some("7"));
        assert_eq!(alarm.severity, Severity::Medium);
        assert_eq!(alarm.severity_level, 2);
        assert_eq!(alarm.state, AlarmState::Active);
        assert_eq!(alarm.timestamp.to_rfc3339(), "2026-03-01T08:15:00+00:00");
        assert_eq!(alarm.trigger_value, Some(TriggerValue::Number(3.5)));
    }

    #[test]
    fn epoch_millis_timestamp() {
        let p = payload(json!({
            "occurrence_id": 1,
            "severity": "low",
            "timestamp": 1_772_352_900_000_i64
        }));
        let alarm = AlarmEvent::try_from(p).unwrap();
        assert_eq!(alarm.timestamp.timestamp_millis(), 1_772_352_900_000);
    }

    #[test]
    fn missing_state_means_active() {
        let p = payload(json!({ "occurrence_id": 1, "severity": "high" }));
        assert_eq!(AlarmEvent::try_from(p).unwrap().state, AlarmState::Active);
    }

    #[test]
    fn empty_severity_uses_level() {
        let p = payload(json!({ "occurrence_id": 1, "severity": "", "severity_level": 4 }));
        assert_eq!(AlarmEvent::try_from(p).unwrap().severity, Severity::Critical);
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let p = payload(json!({ "occurrence_id": 1, "severity": "catastrophic" }));
        assert!(matches!(
            AlarmEvent::try_from(p),
            Err(CoreError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let p = payload(json!({ "occurrence_id": 1, "severity": "low", "state": "exploded" }));
        assert!(AlarmEvent::try_from(p).is_err());
    }

    #[test]
    fn string_trigger_value_is_kept() {
        let p = payload(json!({ "occurrence_id": 1, "severity": "low", "trigger_value": "OPEN" }));
        let alarm = AlarmEvent::try_from(p).unwrap();
        assert_eq!(alarm.trigger_value, Some(TriggerValue::Text("OPEN".into())));
    }

    #[test]
    fn converts_acknowledgment() {
        let ack: AckPayload = serde_json::from_value(json!({
            "occurrence_id": "55",
            "acknowledged_by": 3,
            "comment": "checked",
            "timestamp": "2026-03-01T09:00:00Z"
        }))
        .unwrap();
        let ack = Acknowledgment::from(ack);
        assert_eq!(ack.occurrence_id, OccurrenceId(55));
        assert_eq!(ack.acknowledged_by.as_deref(), Some("3"));
        assert_eq!(ack.comment.as_deref(), Some("checked"));
    }
}
