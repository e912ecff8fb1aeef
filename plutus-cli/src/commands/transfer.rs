//! Transfer command - move money between two accounts

use anyhow::{bail, Result};
use colored::Colorize;
use rust_decimal::Decimal;

use super::{get_context, get_logger, log_event};
use crate::output::{create_table, format_money, success, warning};
use plutus_core::adapters::generator::generate_amount;
use plutus_core::{AccountId, LogEvent, LoggingService, PlutusContext, TransactionRecord};

/// Execute one transfer
///
/// A transfer refused by a business rule is still recorded and counts as a
/// successful command; only rejected input and store failures exit non-zero.
pub fn run(from: i64, to: i64, amount: Decimal, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(
        &logger,
        LogEvent::new("command_executed")
            .with_command("transfer")
            .with_account(from),
    );

    let ctx = get_context()?;
    execute(&ctx, &logger, AccountId(from), AccountId(to), amount, json)
}

/// Transfer between two random accounts, a random amount unless one is given
pub fn run_random(amount: Option<Decimal>, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("random-transfer"));

    let ctx = get_context()?;
    let Some((from, to)) = ctx.repository.random_account_pair()? else {
        bail!("Need at least two accounts; run 'plutus seed' first");
    };
    let amount = amount.unwrap_or_else(|| generate_amount(&mut rand::thread_rng()));

    execute(&ctx, &logger, from, to, amount, json)
}

fn execute(
    ctx: &PlutusContext,
    logger: &Option<LoggingService>,
    from: AccountId,
    to: AccountId,
    amount: Decimal,
    json: bool,
) -> Result<()> {
    let record = match ctx.transfer_service.execute(from, to, amount) {
        Ok(record) => record,
        Err(e) => {
            log_event(
                logger,
                LogEvent::new("transfer_error")
                    .with_command("transfer")
                    .with_account(from.get())
                    .with_error(e.code(), e.to_string()),
            );
            return Err(e.into());
        }
    };

    if let Some(reason) = &record.failure_reason {
        log_event(
            logger,
            LogEvent::new("transfer_failed")
                .with_command("transfer")
                .with_account(from.get())
                .with_error(reason.code(), reason.to_string()),
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    print_record(&record);
    Ok(())
}

fn print_record(record: &TransactionRecord) {
    match &record.failure_reason {
        None => success(&format!("✓ Transfer {} completed", record.id)),
        Some(reason) => warning(&format!("Transfer {} failed: {}", record.id, reason)),
    }
    println!();

    let mut table = create_table();
    table.add_row(vec!["From", &record.from_account_id.to_string()]);
    table.add_row(vec!["To", &record.to_account_id.to_string()]);
    table.add_row(vec![
        "Amount".to_string(),
        format_money(record.amount, &record.currency),
    ]);
    table.add_row(vec![
        "Status".to_string(),
        if record.is_completed() {
            record.status.to_string().green().to_string()
        } else {
            record.status.to_string().red().to_string()
        },
    ]);
    table.add_row(vec![
        "Time".to_string(),
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    ]);
    println!("{}", table);
}
