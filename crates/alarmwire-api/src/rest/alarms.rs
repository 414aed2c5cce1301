// Alarm REST endpoints
//
// Active-alarm listing (snapshot source), occurrence acknowledge / clear,
// and the diagnostic test-alarm trigger.

use tracing::debug;

use crate::error::Error;
use crate::rest::client::AlarmClient;
use crate::rest::models::{ActionBody, AlarmPage, AlarmQuery};

impl AlarmClient {
    /// List one page of active alarms.
    ///
    /// `GET /api/alarms/active?page&limit&severity&state&search`
    pub async fn list_active_alarms(&self, query: &AlarmQuery) -> Result<AlarmPage, Error> {
        let url = self.api_url("alarms/active")?;
        debug!(page = query.page, limit = query.limit, "listing active alarms");
        self.get(url, query).await
    }

    /// Acknowledge an occurrence.
    ///
    /// `POST /api/alarms/occurrences/{id}/acknowledge` with `{"comment": ...}`
    pub async fn acknowledge(&self, occurrence_id: i64, comment: Option<&str>) -> Result<(), Error> {
        let url = self.api_url(&format!("alarms/occurrences/{occurrence_id}/acknowledge"))?;
        debug!(occurrence_id, "acknowledging alarm");
        self.post_action(url, &ActionBody { comment }).await
    }

    /// Clear an occurrence.
    ///
    /// `POST /api/alarms/occurrences/{id}/clear` with `{"comment": ...}`
    pub async fn clear(&self, occurrence_id: i64, comment: Option<&str>) -> Result<(), Error> {
        let url = self.api_url(&format!("alarms/occurrences/{occurrence_id}/clear"))?;
        debug!(occurrence_id, "clearing alarm");
        self.post_action(url, &ActionBody { comment }).await
    }

    /// Ask the server to emit one synthetic alarm on the push channel.
    ///
    /// `POST /api/alarms/test`
    pub async fn trigger_test_alarm(&self) -> Result<(), Error> {
        let url = self.api_url("alarms/test")?;
        debug!("triggering test alarm");
        self.post_action(url, &serde_json::json!({})).await
    }
}
