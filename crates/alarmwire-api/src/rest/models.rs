// Alarm REST API response types
//
// Every endpoint wraps its payload in `ApiResponse<T>`. Fields default
// liberally because older server builds omit pagination on short pages.

use serde::{Deserialize, Serialize};

use crate::protocol::AlarmPayload;

// ── Response Envelope ────────────────────────────────────────────────

/// Standard envelope:
/// ```json
/// { "success": true, "data": { ... }, "message": "optional" }
/// ```
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ── Active alarm page ────────────────────────────────────────────────

/// Pagination block of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
}

fn first_page() -> u32 {
    1
}

/// One page of `GET /api/alarms/active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmPage {
    #[serde(default)]
    pub items: Vec<AlarmPayload>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl AlarmPage {
    /// Total matching alarms on the server, falling back to the item count
    /// when the server omitted pagination.
    pub fn total(&self) -> u64 {
        self.pagination.map_or_else(
            || u64::try_from(self.items.len()).unwrap_or(u64::MAX),
            |p| p.total,
        )
    }
}

// ── Query ────────────────────────────────────────────────────────────

/// Query parameters for the active-alarm listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for AlarmQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 25,
            severity: None,
            state: None,
            search: None,
        }
    }
}

/// Body for acknowledge / clear actions.
#[derive(Debug, Serialize)]
pub(crate) struct ActionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<&'a str>,
}
