// ── Alarm domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Identity of one alarm occurrence.
///
/// Stable across every update to the same occurrence; repeated delivery of
/// the same id is an update, never a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceId(pub i64);

impl OccurrenceId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OccurrenceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Alarm severity, ordered `Info < Low < Medium < High < Critical`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Integer rank, 0 (info) through 4 (critical).
    pub fn rank(self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(Self::Info),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::Critical),
            _ => None,
        }
    }

    /// High and critical alarms count toward the critical total.
    pub fn is_critical(self) -> bool {
        self >= Self::High
    }
}

/// Lifecycle state of an occurrence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AlarmState {
    Inactive,
    Active,
    #[strum(to_string = "acknowledged", serialize = "ack")]
    Acknowledged,
    Cleared,
    Suppressed,
    Shelved,
}

impl AlarmState {
    /// Whether the occurrence still counts as an open alarm.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Acknowledged)
    }
}

/// Opaque value that tripped the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for TriggerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One alarm occurrence as seen by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub occurrence_id: OccurrenceId,
    pub rule_id: Option<i64>,
    pub tenant_id: Option<i64>,
    pub device_id: Option<String>,
    pub point_id: Option<i64>,
    pub message: String,
    pub severity: Severity,
    /// Always `severity.rank()`.
    pub severity_level: u8,
    pub state: AlarmState,
    pub timestamp: DateTime<Utc>,
    pub source_name: Option<String>,
    pub location: Option<String>,
    pub trigger_value: Option<TriggerValue>,
}

impl AlarmEvent {
    /// Minimal active occurrence; the remaining fields can be set directly.
    pub fn new(occurrence_id: i64, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            occurrence_id: OccurrenceId(occurrence_id),
            rule_id: None,
            tenant_id: None,
            device_id: None,
            point_id: None,
            message: message.into(),
            severity,
            severity_level: severity.rank(),
            state: AlarmState::Active,
            timestamp: Utc::now(),
            source_name: None,
            location: None,
            trigger_value: None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity.is_critical()
    }
}

/// Acknowledgment of an occurrence, pushed by the server or produced
/// locally as the optimistic result of a user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub occurrence_id: OccurrenceId,
    pub acknowledged_by: Option<String>,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}
