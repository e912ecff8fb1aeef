//! Seed command - populate the database with generated rows

use anyhow::Result;

use super::{get_context, get_logger, log_event};
use crate::output::success;
use plutus_core::LogEvent;

pub fn run(banks: usize, users: usize, accounts: usize, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("seed"));

    let ctx = get_context()?;
    let result = match ctx.seed_service.seed(banks, users, accounts) {
        Ok(result) => result,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("seed_error")
                    .with_command("seed")
                    .with_error("SEED_FAILED", format!("{:#}", e)),
            );
            return Err(e);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    success(&format!(
        "✓ Created {} banks, {} users and {} accounts",
        result.banks, result.users, result.accounts
    ));
    Ok(())
}
