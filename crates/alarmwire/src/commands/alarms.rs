//! Alarm command handlers.

use serde::Serialize;

use alarmwire_core::{AlarmCountSnapshot, AlarmEvent, AlarmMonitor, MonitorConfig, OccurrenceId};

use crate::cli::{AlarmsArgs, AlarmsCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, AlarmTableRow};

use super::util;

/// Structured form of `alarms list` for json/yaml output.
#[derive(Serialize)]
struct AlarmListing<'a> {
    page: u32,
    page_size: usize,
    total: u64,
    counts: AlarmCountSnapshot,
    items: &'a [AlarmEvent],
}

pub async fn handle(
    mut config: MonitorConfig,
    args: AlarmsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AlarmsCommand::List {
            page,
            limit,
            filter,
        } => {
            if let Some(limit) = limit {
                config.view.page_size = util::page_size(limit)?;
            }
            let monitor = AlarmMonitor::with_defaults(config)?;
            let reconciler = monitor.reconciler();
            reconciler.set_filter(util::alarm_filter(&filter));
            reconciler.set_page(page);
            monitor.refresh().await?;

            let view = monitor.view();
            let counts = monitor.counts();
            let items: Vec<AlarmEvent> = view.visible_rows.iter().map(|r| r.alarm.clone()).collect();

            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    let color = output::should_color(global.color);
                    output::render_list(
                        global.output,
                        &items,
                        |a| AlarmTableRow::new(a, false, color),
                        |a| a.occurrence_id.to_string(),
                    )
                }
                format => output::render_single(
                    format,
                    &AlarmListing {
                        page: view.page_index,
                        page_size: view.page_size,
                        total: view.total_count,
                        counts,
                        items: &items,
                    },
                    |_| String::new(),
                    |_| String::new(),
                ),
            };
            output::print_output(&out, global.quiet);

            if global.output == OutputFormat::Table && !global.quiet {
                eprintln!(
                    "page {} of {} ({} matching) | active {} | critical {}",
                    view.page_index,
                    page_count(view.total_count, view.page_size),
                    view.total_count,
                    counts.active_total,
                    counts.critical_total,
                );
            }
            Ok(())
        }

        AlarmsCommand::Ack { id, comment } => {
            let monitor = AlarmMonitor::with_defaults(config)?;
            monitor.acknowledge(OccurrenceId(id), comment).await?;
            if !global.quiet {
                eprintln!("Alarm {id} acknowledged");
            }
            Ok(())
        }

        AlarmsCommand::Clear { id, comment } => {
            if !util::confirm(&format!("Clear alarm {id}?"), "alarms clear", global.yes)? {
                return Ok(());
            }
            let monitor = AlarmMonitor::with_defaults(config)?;
            monitor.clear(OccurrenceId(id), comment).await?;
            if !global.quiet {
                eprintln!("Alarm {id} cleared");
            }
            Ok(())
        }
    }
}

fn page_count(total: u64, page_size: usize) -> u64 {
    let size = u64::try_from(page_size.max(1)).unwrap_or(u64::MAX);
    total.div_ceil(size).max(1)
}

#[cfg(test)]
mod tests {
    use super::page_count;

    #[test]
    fn page_count_rounds_up_and_never_hits_zero() {
        assert_eq!(page_count(0, 25), 1);
        assert_eq!(page_count(25, 25), 1);
        assert_eq!(page_count(26, 25), 2);
        assert_eq!(page_count(30, 0), 30);
    }
}
