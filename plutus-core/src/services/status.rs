//! Status service - bank, account and transaction summaries

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::{AccountStatus, TransactionStatus};
use crate::ports::TransactionLog;

/// Status service for database summaries
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let accounts = self.repository.get_accounts()?;
        let by_status = self.repository.transaction_counts_by_status()?;
        let count_of = |status: TransactionStatus| {
            by_status
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        Ok(StatusSummary {
            total_banks: self.repository.count_banks()?,
            total_users: self.repository.count_users()?,
            total_accounts: accounts.len() as i64,
            active_accounts: accounts.iter().filter(|a| a.is_transferable()).count() as i64,
            total_transactions: self.repository.transaction_count()?,
            completed_transactions: count_of(TransactionStatus::Completed),
            failed_transactions: count_of(TransactionStatus::Failed),
            pending_transactions: count_of(TransactionStatus::Pending),
            total_balance: self.repository.total_balance()?,
            accounts: accounts
                .into_iter()
                .map(|a| AccountSummary {
                    id: a.id.get(),
                    user_id: a.user_id.get(),
                    bank_id: a.bank_id.get(),
                    status: a.status,
                    is_deleted: a.is_deleted,
                    currency: a.currency,
                    balance: a.balance,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_banks: i64,
    pub total_users: i64,
    pub total_accounts: i64,
    pub active_accounts: i64,
    pub total_transactions: i64,
    pub completed_transactions: i64,
    pub failed_transactions: i64,
    pub pending_transactions: i64,
    pub total_balance: Decimal,
    pub accounts: Vec<AccountSummary>,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub user_id: i64,
    pub bank_id: i64,
    pub status: AccountStatus,
    pub is_deleted: bool,
    pub currency: String,
    pub balance: Decimal,
}
