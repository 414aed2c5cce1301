// ── Alarm list filter ──
//
// Predicate applied to live events before they may enter the visible page,
// and translated into query parameters for page fetches.

use alarmwire_api::AlarmQuery;
use strum::IntoEnumIterator;

use crate::model::{AlarmEvent, AlarmState, Severity};

/// Severity part of the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeverityFilter {
    #[default]
    All,
    Only(Severity),
    AtLeast(Severity),
}

impl SeverityFilter {
    pub fn matches(self, severity: Severity) -> bool {
        match self {
            Self::All => true,
            Self::Only(s) => severity == s,
            Self::AtLeast(s) => severity >= s,
        }
    }
}

/// Active filter of the paged view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmFilter {
    pub severity: SeverityFilter,
    pub state: Option<AlarmState>,
    /// Case-insensitive substring of the alarm message.
    pub search: Option<String>,
}

impl AlarmFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_severity(mut self, severity: SeverityFilter) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_state(mut self, state: AlarmState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then_some(search);
        self
    }

    pub fn matches(&self, alarm: &AlarmEvent) -> bool {
        if !self.severity.matches(alarm.severity) {
            return false;
        }
        if self.state.is_some_and(|s| s != alarm.state) {
            return false;
        }
        match &self.search {
            Some(needle) => alarm
                .message
                .to_lowercase()
                .contains(&needle.trim().to_lowercase()),
            None => true,
        }
    }

    /// Query parameters for fetching `page` under this filter.
    pub fn to_query(&self, page: u32, limit: u32) -> AlarmQuery {
        let severity = match self.severity {
            SeverityFilter::All => None,
            SeverityFilter::Only(s) => Some(s.to_string()),
            SeverityFilter::AtLeast(min) => Some(
                Severity::iter()
                    .filter(|s| *s >= min)
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        };
        AlarmQuery {
            page,
            limit,
            severity,
            state: self.state.map(|s| s.to_string()),
            search: self.search.clone(),
        }
    }
}
