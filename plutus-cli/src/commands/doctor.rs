//! Doctor command - run database integrity checks

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color};
use serde_json::Value;

use super::{get_context, get_logger, log_event};
use crate::output::create_table;
use plutus_core::LogEvent;

/// Detail objects hold a single id field, e.g. `{"account_id": "3"}`
fn format_detail(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}: {}", k, s),
                other => format!("{}: {}", k, other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

pub fn run(verbose: bool, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("doctor"));

    let ctx = get_context()?;
    let result = ctx.doctor_service.run_checks()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", "Database Health Check".bold());
        println!();

        let mut table = create_table();
        table.set_header(vec!["Check", "Status", "Message"]);

        for (check_name, check_result) in &result.checks {
            let status_cell = match check_result.status.as_str() {
                "pass" => Cell::new("PASS").fg(Color::Green),
                "warning" => Cell::new("WARN").fg(Color::Yellow),
                "error" => Cell::new("ERROR").fg(Color::Red),
                _ => Cell::new(&check_result.status),
            };

            table.add_row(vec![
                Cell::new(check_name),
                status_cell,
                Cell::new(&check_result.message),
            ]);

            if verbose {
                for detail in check_result.details.iter().flatten() {
                    table.add_row(vec![
                        Cell::new(""),
                        Cell::new(""),
                        Cell::new(format!("  - {}", format_detail(detail))),
                    ]);
                }
            }
        }

        println!("{}", table);
        println!();

        println!(
            "Summary: {} passed, {} warnings, {} errors",
            result.summary.passed.to_string().green(),
            result.summary.warnings.to_string().yellow(),
            result.summary.errors.to_string().red(),
        );
    }

    if !result.is_healthy() {
        log_event(
            &logger,
            LogEvent::new("doctor_failed")
                .with_command("doctor")
                .with_error("INTEGRITY", format!("{} check(s) failed", result.summary.errors)),
        );
        std::process::exit(1);
    }

    Ok(())
}
