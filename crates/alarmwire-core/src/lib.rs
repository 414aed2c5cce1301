//! Real-time alarm distribution client built on `alarmwire-api`.
//!
//! - **[`AlarmMonitor`]**: composition root. [`init()`](AlarmMonitor::init)
//!   seeds counts and the first page from REST, connects the push channel,
//!   and keeps both in step with live events until
//!   [`dispose()`](AlarmMonitor::dispose).
//!
//! - **[`ConnectionManager`]**: explicit session state machine with a single
//!   in-flight connect, a hard connect timeout, bounded exponential backoff
//!   and channel rejoin on every connect.
//!
//! - **[`EventDispatcher`]**: typed publish/subscribe with per-handler
//!   failure isolation and disposable [`Subscription`] handles.
//!
//! - **[`AlarmCountAggregate`]** and **[`PagedAlarmReconciler`]**: running
//!   active/critical totals and the filtered, paginated view that absorbs
//!   live events without shifting rows under the reader.

pub mod collaborator;
pub mod config;
pub mod connection;
pub mod convert;
pub mod counts;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod stream;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use collaborator::{AlarmActions, AlarmSnapshotSource, SnapshotPage};
pub use config::{EndpointConfig, MonitorConfig, TlsVerification};
pub use connection::{
    ChannelSubscriber, ConnectionManager, ConnectionSettings, PhaseKind, ReconnectConfig,
};
pub use counts::{AlarmCountAggregate, AlarmCountSnapshot};
pub use dispatch::{
    DispatchReport, EventCategory, EventDispatcher, HandlerError, HandlerResult, MonitorEvent,
    Subscription,
};
pub use error::{ConnectError, CoreError};
pub use monitor::AlarmMonitor;
pub use notify::NotificationSink;
pub use stream::SnapshotStream;
pub use view::{
    AlarmFilter, AlarmRow, PagedAlarmReconciler, PagedView, PendingPolicy, SeverityFilter,
    ViewConfig,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Acknowledgment, AlarmEvent, AlarmState, ConnectionState, ConnectionStatus, ErrorEvent,
    ErrorKind, FailureKind, OccurrenceId, Severity, TriggerValue,
};
