//! Rendering for `--output`.
//!
//! Alarm tables go through `tabled` with severity colouring; json, yaml and
//! plain serialize the underlying models so scripts see stable field names.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use alarmwire_core::{AlarmEvent, AlarmState, ConnectionState, Severity};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// `auto` colours only an interactive stdout without `NO_COLOR`.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

pub fn paint_severity(severity: Severity, color: bool) -> String {
    let label = severity.to_string().to_uppercase();
    if !color {
        return label;
    }
    match severity {
        Severity::Critical => label.white().on_red().bold().to_string(),
        Severity::High => label.red().bold().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.cyan().to_string(),
        Severity::Info => label.dimmed().to_string(),
    }
}

pub fn paint_connection(state: ConnectionState, color: bool) -> String {
    let label = state.to_string();
    if !color {
        return label;
    }
    match state {
        ConnectionState::Connected => label.green().to_string(),
        ConnectionState::Connecting => label.yellow().to_string(),
        ConnectionState::Disconnected => label.dimmed().to_string(),
        ConnectionState::Error => label.red().bold().to_string(),
    }
}

// ── Alarm rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct AlarmTableRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl AlarmTableRow {
    pub fn new(alarm: &AlarmEvent, highlight: bool, color: bool) -> Self {
        let id = if highlight {
            format!("{} *", alarm.occurrence_id)
        } else {
            alarm.occurrence_id.to_string()
        };
        let source = match (&alarm.source_name, &alarm.location) {
            (Some(name), Some(location)) => format!("{name} ({location})"),
            (Some(name), None) => name.clone(),
            (None, Some(location)) => location.clone(),
            (None, None) => alarm.device_id.clone().unwrap_or_default(),
        };
        Self {
            id,
            time: alarm.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            severity: paint_severity(alarm.severity, color),
            state: alarm.state.to_string(),
            source,
            message: alarm.message.clone(),
        }
    }
}

/// One-line rendering used by the live stream.
pub fn alarm_line(alarm: &AlarmEvent, color: bool) -> String {
    let state = match alarm.state {
        AlarmState::Active => String::new(),
        other => format!(" [{other}]"),
    };
    format!(
        "{} {:>8} #{} {}{}",
        alarm.timestamp.format("%H:%M:%S"),
        paint_severity(alarm.severity, color),
        alarm.occurrence_id,
        alarm.message,
        state,
    )
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a collection. `to_row` builds the table row for `table`; `id_fn`
/// gives the single value printed per item for `plain`.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render one value; `detail_fn` supplies the human-readable `table` form.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Write to stdout unless `--quiet` or there is nothing to show.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn alarm() -> AlarmEvent {
        let mut alarm = AlarmEvent::new(17, Severity::High, "Boiler 2 pressure high");
        alarm.source_name = Some("PT-201".into());
        alarm
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let alarms = vec![alarm(), AlarmEvent::new(18, Severity::Low, "Door open")];
        let out = render_list(
            OutputFormat::Plain,
            &alarms,
            |a| AlarmTableRow::new(a, false, false),
            |a| a.occurrence_id.to_string(),
        );
        assert_eq!(out, "17\n18");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_single(OutputFormat::JsonCompact, &alarm(), |_| String::new(), |_| String::new());
        assert!(!out.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["severity"], "high");
        assert_eq!(value["occurrence_id"], 17);
    }

    #[test]
    fn table_marks_highlighted_rows() {
        let out = render_list(
            OutputFormat::Table,
            &[alarm()],
            |a| AlarmTableRow::new(a, true, false),
            |a| a.occurrence_id.to_string(),
        );
        assert!(out.contains("17 *"));
        assert!(out.contains("HIGH"));
        assert!(out.contains("PT-201"));
    }

    #[test]
    fn stream_line_without_color() {
        let mut cleared = alarm();
        cleared.state = AlarmState::Cleared;
        let line = alarm_line(&cleared, false);
        assert!(line.ends_with("#17 Boiler 2 pressure high [cleared]"), "{line}");
    }
}
