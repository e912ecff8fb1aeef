//! Simulate command - random concurrent transfers with a progress bar

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::{get_context, get_logger, log_event};
use crate::output::{create_table, error, format_money, success};
use plutus_core::LogEvent;

pub fn run(count: Option<usize>, workers: Option<usize>, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("simulate"));

    let ctx = get_context()?;
    let count = count.unwrap_or(ctx.config.simulation_count);
    let workers = workers.unwrap_or(ctx.config.simulation_workers);
    let simulation = ctx.simulation_service()?;

    let progress = if json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(count as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} transfers ({eta})")?
                .progress_chars("=> "),
        );
        bar
    };

    let summary = simulation.run_with_progress(count, workers, |done| {
        progress.set_position(done as u64);
    })?;
    progress.finish_and_clear();

    let mut event = LogEvent::new("simulation_completed").with_command("simulate");
    if !summary.is_conserved() {
        event = event.with_error(
            "BALANCE_DRIFT",
            format!("total changed after {} transfers", summary.requested),
        );
    }
    log_event(&logger, event);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let currency = &ctx.config.currency;
    let mut table = create_table();
    table.add_row(vec!["Requested", &summary.requested.to_string()]);
    table.add_row(vec!["Completed", &summary.completed.to_string()]);
    table.add_row(vec!["Failed", &summary.failed.to_string()]);
    for (code, n) in &summary.failures {
        table.add_row(vec![format!("  {}", code), n.to_string()]);
    }
    table.add_row(vec!["Errored", &summary.errored.to_string()]);
    for (code, n) in &summary.errors {
        table.add_row(vec![format!("  {}", code), n.to_string()]);
    }
    table.add_row(vec![
        "Total before".to_string(),
        format_money(summary.total_before, currency),
    ]);
    table.add_row(vec![
        "Total after".to_string(),
        format_money(summary.total_after, currency),
    ]);
    table.add_row(vec![
        "Elapsed".to_string(),
        format!("{} ms", summary.elapsed_ms),
    ]);

    println!("{}", "Simulation".bold());
    println!("{}", table);
    println!();

    if summary.is_conserved() {
        success("✓ Total balance unchanged");
    } else {
        error("✗ Total balance changed during the simulation");
    }

    Ok(())
}
