//! Status command - show database summary and account balances

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color};

use super::get_context;
use crate::output::{create_table, format_money, format_size};

const RECENT_TRANSACTIONS: usize = 10;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Plutus Status".bold());
    println!();

    let mut table = create_table();
    table.add_row(vec!["Banks", &status.total_banks.to_string()]);
    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec![
        "Accounts".to_string(),
        format!("{} ({} active)", status.total_accounts, status.active_accounts),
    ]);
    table.add_row(vec![
        "Transactions".to_string(),
        format!(
            "{} ({} completed, {} failed, {} pending)",
            status.total_transactions,
            status.completed_transactions,
            status.failed_transactions,
            status.pending_transactions
        ),
    ]);
    table.add_row(vec![
        "Total balance".to_string(),
        format_money(status.total_balance, &ctx.config.currency),
    ]);
    table.add_row(vec![
        "Database size".to_string(),
        format_size(ctx.repository.get_db_size()?),
    ]);

    println!("{}", table);

    if status.accounts.is_empty() {
        println!();
        println!("No accounts yet. Run 'plutus seed' to create some.");
        return Ok(());
    }

    println!();
    println!("{}", "Accounts".bold());

    let mut accounts = create_table();
    accounts.set_header(vec!["ID", "User", "Bank", "Status", "Balance"]);
    for account in &status.accounts {
        let status_cell = if account.is_deleted {
            Cell::new("deleted").fg(Color::DarkGrey)
        } else {
            match account.status.as_str() {
                "active" => Cell::new("active").fg(Color::Green),
                "frozen" => Cell::new("frozen").fg(Color::Yellow),
                other => Cell::new(other).fg(Color::Red),
            }
        };

        accounts.add_row(vec![
            Cell::new(account.id),
            Cell::new(account.user_id),
            Cell::new(account.bank_id),
            status_cell,
            Cell::new(format_money(account.balance, &account.currency)),
        ]);
    }
    println!("{}", accounts);

    let recent = ctx.repository.recent_transactions(RECENT_TRANSACTIONS)?;
    if !recent.is_empty() {
        println!();
        println!("{}", "Recent Transactions".bold());

        let mut transactions = create_table();
        transactions.set_header(vec!["ID", "From", "To", "Amount", "Status", "Reason"]);
        for record in &recent {
            let status_cell = if record.is_completed() {
                Cell::new(record.status).fg(Color::Green)
            } else {
                Cell::new(record.status).fg(Color::Red)
            };
            transactions.add_row(vec![
                Cell::new(record.id),
                Cell::new(record.from_account_id),
                Cell::new(record.to_account_id),
                Cell::new(format_money(record.amount, &record.currency)),
                status_cell,
                Cell::new(
                    record
                        .failure_reason
                        .as_ref()
                        .map(|r| r.code())
                        .unwrap_or(""),
                ),
            ]);
        }
        println!("{}", transactions);
    }

    Ok(())
}
