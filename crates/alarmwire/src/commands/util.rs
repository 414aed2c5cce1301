//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use alarmwire_core::{AlarmFilter, AlarmState, Severity, SeverityFilter};

use crate::cli::{FilterArgs, GlobalOpts, OutputFormat, SeverityArg, StateArg};
use crate::error::CliError;

pub fn severity(arg: SeverityArg) -> Severity {
    match arg {
        SeverityArg::Info => Severity::Info,
        SeverityArg::Low => Severity::Low,
        SeverityArg::Medium => Severity::Medium,
        SeverityArg::High => Severity::High,
        SeverityArg::Critical => Severity::Critical,
    }
}

pub fn alarm_state(arg: StateArg) -> AlarmState {
    match arg {
        StateArg::Inactive => AlarmState::Inactive,
        StateArg::Active => AlarmState::Active,
        StateArg::Acknowledged => AlarmState::Acknowledged,
        StateArg::Cleared => AlarmState::Cleared,
        StateArg::Suppressed => AlarmState::Suppressed,
        StateArg::Shelved => AlarmState::Shelved,
    }
}

/// Translate filter flags into the view filter.
pub fn alarm_filter(args: &FilterArgs) -> AlarmFilter {
    let severity_filter = match (args.severity, args.min_severity) {
        (Some(s), _) => SeverityFilter::Only(severity(s)),
        (None, Some(s)) => SeverityFilter::AtLeast(severity(s)),
        (None, None) => SeverityFilter::All,
    };
    let mut filter = AlarmFilter::all().with_severity(severity_filter);
    if let Some(state) = args.state {
        filter = filter.with_state(alarm_state(state));
    }
    if let Some(ref search) = args.search {
        filter = filter.with_search(search.clone());
    }
    filter
}

/// Page size flag as the view's `usize`.
pub fn page_size(value: u32) -> Result<usize, CliError> {
    usize::try_from(value).map_err(|_| CliError::Validation {
        field: "page-size".into(),
        reason: format!("{value} is too large"),
    })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so the operation is refused.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Spinner on stderr for interactive table output; `None` otherwise.
pub fn spinner(message: impl Into<String>, global: &GlobalOpts) -> Option<ProgressBar> {
    if global.quiet || global.output != OutputFormat::Table || !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    Some(bar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_severity_wins_over_minimum() {
        let args = FilterArgs {
            severity: Some(SeverityArg::High),
            min_severity: Some(SeverityArg::Low),
            ..FilterArgs::default()
        };
        assert_eq!(alarm_filter(&args).severity, SeverityFilter::Only(Severity::High));
    }

    #[test]
    fn filter_flags_map_onto_view_filter() {
        let args = FilterArgs {
            min_severity: Some(SeverityArg::Medium),
            state: Some(StateArg::Acknowledged),
            search: Some("boiler".into()),
            ..FilterArgs::default()
        };
        let filter = alarm_filter(&args);
        assert_eq!(filter.severity, SeverityFilter::AtLeast(Severity::Medium));
        assert_eq!(filter.state, Some(AlarmState::Acknowledged));
        assert_eq!(filter.search.as_deref(), Some("boiler"));
    }

    #[test]
    fn no_flags_means_everything() {
        assert_eq!(alarm_filter(&FilterArgs::default()), AlarmFilter::all());
    }
}
