//! `watch`: live alarm stream with a running status line.

use std::io::{self, Write};
use std::sync::Arc;

use serde::Serialize;

use alarmwire_core::{
    Acknowledgment, AlarmCountSnapshot, AlarmEvent, AlarmFilter, AlarmMonitor, ConnectionStatus,
    MonitorConfig, NotificationSink,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, AlarmTableRow};

use super::util;

/// One line of `--output json` / `json-compact` stream output.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum StreamRecord<'a> {
    Alarm { alarm: &'a AlarmEvent },
    Acknowledged { ack: &'a Acknowledgment },
    Connection { status: &'a ConnectionStatus },
    Counts { counts: &'a AlarmCountSnapshot },
}

/// Prints notification triggers to the terminal.
struct TerminalNotifier {
    format: OutputFormat,
    color: bool,
    bell: bool,
    quiet: bool,
}

impl TerminalNotifier {
    fn structured(&self) -> bool {
        matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    fn emit(&self, record: &StreamRecord<'_>) {
        // One record per line even for `--output json`.
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(io::stdout().lock(), "{line}");
        }
    }
}

impl NotificationSink for TerminalNotifier {
    fn alarm_raised(&self, alarm: &AlarmEvent) {
        if self.structured() {
            self.emit(&StreamRecord::Alarm { alarm });
            return;
        }
        if self.bell {
            let _ = write!(io::stderr().lock(), "\x07");
        }
        if !self.quiet {
            let _ = writeln!(io::stdout().lock(), "{}", output::alarm_line(alarm, self.color));
        }
    }

    fn alarm_acknowledged(&self, ack: &Acknowledgment) {
        if self.structured() {
            self.emit(&StreamRecord::Acknowledged { ack });
            return;
        }
        if !self.quiet {
            let by = ack.acknowledged_by.as_deref().unwrap_or("unknown");
            let _ = writeln!(
                io::stdout().lock(),
                "{} acknowledged #{} by {by}",
                ack.timestamp.format("%H:%M:%S"),
                ack.occurrence_id,
            );
        }
    }

    fn connection_changed(&self, status: &ConnectionStatus) {
        if self.structured() {
            self.emit(&StreamRecord::Connection { status });
            return;
        }
        if self.quiet {
            return;
        }
        let mut line = format!("push channel {}", output::paint_connection(status.status, self.color));
        if let Some(ref error) = status.error {
            line.push_str(&format!(" ({error})"));
        }
        if status.attempt > 0 {
            line.push_str(&format!(" [attempt {}]", status.attempt));
        }
        eprintln!("{line}");
    }
}

pub async fn handle(
    mut config: MonitorConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(size) = args.page_size {
        config.view.page_size = util::page_size(size)?;
    }
    let color = output::should_color(global.color);
    let notifier = Arc::new(TerminalNotifier {
        format: global.output,
        color,
        bell: args.bell,
        quiet: global.quiet,
    });

    let monitor = AlarmMonitor::with_defaults(config)?;
    monitor.set_notifier(notifier.clone());

    let filter = util::alarm_filter(&args.filter);
    if filter != AlarmFilter::all() {
        monitor.reconciler().set_filter(filter);
    }

    let spinner = util::spinner("Connecting to alarm server...", global);
    monitor.init().await?;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    if args.show_page {
        print_page(&monitor, global, color);
    }

    let mut counts = monitor.count_stream();
    let mut view = monitor.view_stream();
    print_counts(&notifier, counts.current());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = counts.changed() => match changed {
                Some(snapshot) => print_counts(&notifier, &snapshot),
                None => break,
            },
            changed = view.changed(), if args.show_page => match changed {
                Some(_) => print_page(&monitor, global, color),
                None => break,
            },
        }
    }

    monitor.dispose();
    tracing::debug!("watch stopped");
    Ok(())
}

fn print_counts(notifier: &TerminalNotifier, counts: &AlarmCountSnapshot) {
    if notifier.structured() {
        notifier.emit(&StreamRecord::Counts { counts });
    } else if !notifier.quiet {
        eprintln!(
            "active {} | critical {}",
            counts.active_total, counts.critical_total
        );
    }
}

fn print_page(monitor: &AlarmMonitor, global: &GlobalOpts, color: bool) {
    if global.output != OutputFormat::Table || global.quiet {
        return;
    }
    let view = monitor.view();
    let table = output::render_list(
        OutputFormat::Table,
        &view.visible_rows,
        |row| AlarmTableRow::new(&row.alarm, row.is_new, color),
        |row| row.alarm.occurrence_id.to_string(),
    );
    output::print_output(&table, false);
    if view.pending_count > 0 {
        eprintln!("{} alarm(s) arrived off this page", view.pending_count);
    }
}
