//! `test-alarm` handler.

use alarmwire_core::{AlarmMonitor, MonitorConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(config: MonitorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor = AlarmMonitor::with_defaults(config)?;
    monitor.inject_test_alarm().await?;
    if !global.quiet {
        eprintln!("Test alarm requested; it arrives on the push channel like any other");
    }
    Ok(())
}
