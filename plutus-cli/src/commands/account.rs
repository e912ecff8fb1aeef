//! Account command - change status or soft-delete an account

use anyhow::{bail, Result};
use clap::Subcommand;
use dialoguer::Confirm;

use super::{get_context, get_logger, log_event};
use crate::output::{format_money, info, success, warning};
use plutus_core::{AccountId, AccountStatus, LogEvent};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Set an account's status (active, closed or frozen)
    Status {
        /// Account ID
        id: i64,
        /// New status
        status: AccountStatus,
    },
    /// Soft-delete an account; it stays in the database but stops transferring
    Delete {
        /// Account ID
        id: i64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

pub fn run(command: AccountCommands) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;

    match command {
        AccountCommands::Status { id, status } => {
            log_event(
                &logger,
                LogEvent::new("command_executed")
                    .with_command("account status")
                    .with_account(id),
            );

            let Some(account) = ctx.repository.get_account_by_id(AccountId(id))? else {
                bail!("Account {} not found", id);
            };
            if account.status == status {
                info(&format!("Account {} is already {}", id, status));
                return Ok(());
            }

            ctx.repository.set_account_status(AccountId(id), status)?;
            success(&format!("✓ Account {}: {} -> {}", id, account.status, status));
        }
        AccountCommands::Delete { id, force } => {
            log_event(
                &logger,
                LogEvent::new("command_executed")
                    .with_command("account delete")
                    .with_account(id),
            );

            let Some(account) = ctx.repository.get_account_by_id(AccountId(id))? else {
                bail!("Account {} not found", id);
            };
            if account.is_deleted {
                info(&format!("Account {} is already deleted", id));
                return Ok(());
            }

            if !force {
                if !account.balance.is_zero() {
                    warning(&format!(
                        "Account {} still holds {}",
                        id,
                        format_money(account.balance, &account.currency)
                    ));
                }
                if !Confirm::new()
                    .with_prompt(format!("Delete account {}?", id))
                    .default(false)
                    .interact()?
                {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            ctx.repository.soft_delete_account(AccountId(id))?;
            success(&format!("✓ Account {} deleted", id));
        }
    }

    Ok(())
}
