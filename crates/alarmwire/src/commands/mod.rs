//! Command dispatch: bridges CLI args -> AlarmMonitor -> output formatting.

pub mod alarms;
pub mod config_cmd;
pub mod test_alarm;
pub mod util;
pub mod watch;

use alarmwire_core::MonitorConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: MonitorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Alarms(args) => alarms::handle(config, args, global).await,
        Command::TestAlarm => test_alarm::handle(config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
