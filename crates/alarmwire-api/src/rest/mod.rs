// Alarm REST API client modules
//
// Request/response collaborators around the live stream: the paged
// active-alarm snapshot, acknowledge/clear actions, and test injection.
// All responses share the `{ success, data, message }` envelope.

pub mod alarms;
pub mod client;
pub mod models;

pub use client::AlarmClient;
pub use models::{AlarmPage, AlarmQuery, Pagination};
