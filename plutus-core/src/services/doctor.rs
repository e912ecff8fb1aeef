//! Doctor service - database integrity checks
//!
//! The schema carries no foreign keys or check constraints, so the
//! invariants the transfer engine maintains are audited here instead.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::adapters::duckdb::DuckDbRepository;

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<DuckDbRepository>,
}

impl DoctorService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = BTreeMap::new();

        let negative = self.repository.check_negative_balances()?;
        checks.insert(
            "negative_balances".to_string(),
            CheckResult::from_findings(
                &negative,
                "error",
                "account_id",
                "No account has a negative balance",
                "account(s) have a negative balance",
            ),
        );

        let self_transfers = self.repository.check_self_transfers()?;
        checks.insert(
            "self_transfers".to_string(),
            CheckResult::from_findings(
                &self_transfers,
                "error",
                "transaction_id",
                "No transaction moves funds to its own source",
                "transaction(s) use the same account as source and destination",
            ),
        );

        let non_terminal = self.repository.check_non_terminal_transactions()?;
        checks.insert(
            "non_terminal_transactions".to_string(),
            CheckResult::from_findings(
                &non_terminal,
                "warning",
                "transaction_id",
                "Every transaction is completed or failed",
                "transaction(s) are not in a terminal state",
            ),
        );

        let invalid = self.repository.check_invalid_amounts()?;
        checks.insert(
            "invalid_amounts".to_string(),
            CheckResult::from_findings(
                &invalid,
                "error",
                "transaction_id",
                "All amounts are positive and outcomes are consistent",
                "transaction(s) have a non-positive amount or a status/reason mismatch",
            ),
        );

        let orphaned = self.repository.check_orphaned_transactions()?;
        checks.insert(
            "orphaned_transactions".to_string(),
            CheckResult::from_findings(
                &orphaned,
                "error",
                "transaction_id",
                "No orphaned transactions found",
                "transaction(s) reference missing accounts",
            ),
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

impl DoctorResult {
    pub fn is_healthy(&self) -> bool {
        self.summary.errors == 0
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn from_findings<T: Display>(
        findings: &[T],
        severity: &str,
        key: &str,
        ok_message: &str,
        problem: &str,
    ) -> Self {
        if findings.is_empty() {
            return Self {
                status: "pass".to_string(),
                message: ok_message.to_string(),
                details: None,
            };
        }
        Self {
            status: severity.to_string(),
            message: format!("{} {}", findings.len(), problem),
            details: Some(
                findings
                    .iter()
                    .map(|id| json!({ key: id.to_string() }))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Account, BankId, UserId};
    use crate::services::TransferService;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[test]
    fn test_clean_database_passes() {
        let repo = Arc::new(DuckDbRepository::open_in_memory(Duration::from_secs(5)).unwrap());
        repo.ensure_schema().unwrap();
        let a = repo
            .insert_account(&Account::new(UserId(1), BankId(1), "EUR", dec!(10.00)))
            .unwrap();
        let b = repo
            .insert_account(&Account::new(UserId(1), BankId(1), "EUR", dec!(10.00)))
            .unwrap();
        let engine = TransferService::new(repo.clone());
        engine.execute(a, b, dec!(5)).unwrap();
        engine.execute(a, b, dec!(50)).unwrap();

        let result = DoctorService::new(repo).run_checks().unwrap();
        assert!(result.is_healthy());
        assert_eq!(result.summary.passed, 5);
        assert!(result.checks["self_transfers"].details.is_none());
    }

    #[test]
    fn test_findings_carry_ids() {
        let check = CheckResult::from_findings(&[3, 9], "error", "account_id", "ok", "bad rows");
        assert_eq!(check.status, "error");
        assert_eq!(check.message, "2 bad rows");
        let details = check.details.unwrap();
        assert_eq!(details[1]["account_id"], "9");
    }
}
