// ── Channel (room) subscriber ──
//
// The server forgets room membership when a session drops, so every new
// session re-joins from scratch. Nothing here survives a reconnect.

use tracing::{debug, warn};

use alarmwire_api::ClientMessage;

use crate::error::CoreError;

/// Anything that can put a frame on the live session.
pub trait FrameSink {
    fn send_frame(&self, message: ClientMessage) -> Result<(), CoreError>;
}

/// Issues the tenant and admin joins on each connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSubscriber {
    tenant_id: Option<i64>,
    admin: bool,
}

impl ChannelSubscriber {
    pub fn new(tenant_id: Option<i64>, admin: bool) -> Self {
        Self { tenant_id, admin }
    }

    /// Join frames for a fresh session, tenant first.
    pub fn joins(&self) -> Vec<ClientMessage> {
        let mut joins = Vec::with_capacity(2);
        if let Some(tenant_id) = self.tenant_id {
            joins.push(ClientMessage::JoinTenant { tenant_id });
        }
        if self.admin {
            joins.push(ClientMessage::JoinAdmin);
        }
        joins
    }

    /// Send every join. Failures are logged and returned, never retried;
    /// a failed join does not affect the connection.
    pub fn join_all(&self, sink: &impl FrameSink) -> Vec<(ClientMessage, CoreError)> {
        let mut failures = Vec::new();
        for join in self.joins() {
            match sink.send_frame(join.clone()) {
                Ok(()) => debug!(?join, "channel join sent"),
                Err(e) => {
                    warn!(?join, error = %e, "channel join failed");
                    failures.push((join, e));
                }
            }
        }
        failures
    }
}
