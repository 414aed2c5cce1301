// ── REST collaborators ──
//
// The monitor never talks HTTP directly. It asks a snapshot source for
// pages of open alarms and an action endpoint to acknowledge, clear or
// raise a test alarm. `AlarmClient` implements both; tests swap in fakes.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::warn;

use alarmwire_api::{AlarmClient, AlarmQuery};

use crate::error::CoreError;
use crate::model::{AlarmEvent, OccurrenceId};

/// One page of open alarms, already converted to the domain model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotPage {
    pub items: Vec<AlarmEvent>,
    /// Server-side total for the whole query, not just this page.
    pub total: u64,
    pub page: u32,
}

/// Source of authoritative open-alarm snapshots.
pub trait AlarmSnapshotSource: Send + Sync + 'static {
    fn fetch_active(&self, query: AlarmQuery) -> BoxFuture<'_, Result<SnapshotPage, CoreError>>;
}

/// Server-side alarm mutations.
pub trait AlarmActions: Send + Sync + 'static {
    fn acknowledge(
        &self,
        occurrence_id: OccurrenceId,
        comment: Option<String>,
    ) -> BoxFuture<'_, Result<(), CoreError>>;

    fn clear(
        &self,
        occurrence_id: OccurrenceId,
        comment: Option<String>,
    ) -> BoxFuture<'_, Result<(), CoreError>>;

    fn trigger_test_alarm(&self) -> BoxFuture<'_, Result<(), CoreError>>;
}

impl AlarmSnapshotSource for AlarmClient {
    fn fetch_active(&self, query: AlarmQuery) -> BoxFuture<'_, Result<SnapshotPage, CoreError>> {
        async move {
            let page = self.list_active_alarms(&query).await?;
            let total = page.total();
            let items = page
                .items
                .into_iter()
                .filter_map(|payload| {
                    let id = payload.occurrence_id;
                    AlarmEvent::try_from(payload)
                        .map_err(|e| warn!(occurrence_id = id, error = %e, "skipping unusable alarm"))
                        .ok()
                })
                .collect();
            Ok(SnapshotPage {
                items,
                total,
                page: query.page,
            })
        }
        .boxed()
    }
}

impl AlarmActions for AlarmClient {
    fn acknowledge(
        &self,
        occurrence_id: OccurrenceId,
        comment: Option<String>,
    ) -> BoxFuture<'_, Result<(), CoreError>> {
        async move {
            AlarmClient::acknowledge(self, occurrence_id.get(), comment.as_deref())
                .await
                .map_err(|e| not_found_as_occurrence(e, occurrence_id))
        }
        .boxed()
    }

    fn clear(
        &self,
        occurrence_id: OccurrenceId,
        comment: Option<String>,
    ) -> BoxFuture<'_, Result<(), CoreError>> {
        async move {
            AlarmClient::clear(self, occurrence_id.get(), comment.as_deref())
                .await
                .map_err(|e| not_found_as_occurrence(e, occurrence_id))
        }
        .boxed()
    }

    fn trigger_test_alarm(&self) -> BoxFuture<'_, Result<(), CoreError>> {
        async move { Ok(AlarmClient::trigger_test_alarm(self).await?) }.boxed()
    }
}

fn not_found_as_occurrence(err: alarmwire_api::Error, occurrence_id: OccurrenceId) -> CoreError {
    if err.is_not_found() {
        CoreError::OccurrenceNotFound { occurrence_id }
    } else {
        err.into()
    }
}
