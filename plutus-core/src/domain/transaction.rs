//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::{AccountId, AccountStatus};
use super::result::{Error, Result, UnknownVariant};

/// Number of fractional digits carried by every amount and balance
pub const AMOUNT_SCALE: u32 = 2;

/// Largest amount a DECIMAL(18,2) column can hold
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, 2);

row_id! {
    /// Primary key of a transaction log row
    TransactionId
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Completed and failed never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            _ => Err(UnknownVariant::new("transaction status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transfer" => Ok(TransactionType::Transfer),
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            _ => Err(UnknownVariant::new("transaction type", s)),
        }
    }
}

/// Why a transfer was recorded as failed
///
/// These are expected business outcomes, not faults. They travel inside the
/// returned record; callers that prefer an error can use the reason as one.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("account {account_id} is not active (status {status}, deleted: {is_deleted})")]
    AccountNotActive {
        account_id: AccountId,
        status: AccountStatus,
        is_deleted: bool,
    },

    #[error("currency mismatch: {source_currency} -> {destination_currency}")]
    CurrencyMismatch {
        source_currency: String,
        destination_currency: String,
    },

    #[error("balance of account {account_id} would exceed {limit}")]
    BalanceLimitExceeded { account_id: AccountId, limit: Decimal },
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::InsufficientFunds { .. } => "insufficient_funds",
            FailureReason::AccountNotActive { .. } => "account_not_active",
            FailureReason::CurrencyMismatch { .. } => "currency_mismatch",
            FailureReason::BalanceLimitExceeded { .. } => "balance_limit_exceeded",
        }
    }
}

/// A validated transfer proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    /// Always positive, rescaled to [`AMOUNT_SCALE`] digits
    pub amount: Decimal,
}

impl TransferRequest {
    /// Validate and normalize a proposed transfer
    ///
    /// Rejects non-positive amounts, amounts with sub-cent precision,
    /// amounts beyond the storable range and self-transfers.
    pub fn new(from: AccountId, to: AccountId, amount: Decimal) -> Result<Self> {
        if from == to {
            return Err(Error::invalid_transfer(format!(
                "source and destination are the same account ({})",
                from
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(Error::invalid_transfer(format!(
                "amount must be greater than zero, got {}",
                amount
            )));
        }
        if amount > MAX_AMOUNT {
            return Err(Error::invalid_transfer(format!(
                "amount {} exceeds the maximum of {}",
                amount, MAX_AMOUNT
            )));
        }

        let mut amount = amount.normalize();
        if amount.scale() > AMOUNT_SCALE {
            return Err(Error::invalid_transfer(format!(
                "amount {} has more than {} fractional digits",
                amount, AMOUNT_SCALE
            )));
        }
        amount.rescale(AMOUNT_SCALE);

        Ok(Self { from, to, amount })
    }

    /// The two account ids in lock order (ascending)
    pub fn lock_order(&self) -> [AccountId; 2] {
        if self.from < self.to {
            [self.from, self.to]
        } else {
            [self.to, self.from]
        }
    }
}

/// One row of the transaction log
///
/// Records are written once, already terminal, and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Assigned by the log on append
    pub id: TransactionId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// Set only when `status` is failed
    pub failure_reason: Option<FailureReason>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    fn new(
        request: &TransferRequest,
        currency: &str,
        status: TransactionStatus,
        failure_reason: Option<FailureReason>,
    ) -> Self {
        // Stores keep microseconds
        let now = Utc::now().trunc_subsecs(6);
        Self {
            id: TransactionId(0),
            from_account_id: request.from,
            to_account_id: request.to,
            amount: request.amount,
            currency: currency.to_string(),
            transaction_type: TransactionType::Transfer,
            status,
            failure_reason,
            timestamp: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// A transfer whose balance changes are applied in the same unit
    pub fn completed(request: &TransferRequest, currency: &str) -> Self {
        Self::new(request, currency, TransactionStatus::Completed, None)
    }

    /// A transfer that changed no balance
    pub fn failed(request: &TransferRequest, currency: &str, reason: FailureReason) -> Self {
        Self::new(request, currency, TransactionStatus::Failed, Some(reason))
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check the shape every stored row must have
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.from_account_id == self.to_account_id {
            return Err("transaction cannot reference the same account twice");
        }
        if self.amount <= Decimal::ZERO {
            return Err("transaction amount must be positive");
        }
        match (self.status, &self.failure_reason) {
            (TransactionStatus::Failed, None) => Err("failed transaction needs a reason"),
            (TransactionStatus::Completed, Some(_)) => {
                Err("completed transaction cannot carry a failure reason")
            }
            _ => Ok(()),
        }
    }
}
