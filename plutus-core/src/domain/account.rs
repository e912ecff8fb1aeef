//! Account domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bank::BankId;
use super::result::UnknownVariant;
use super::user::UserId;

row_id! {
    /// Primary key of an account.
    ///
    /// The numeric order is the global lock order: any code that locks two
    /// accounts locks the smaller id first.
    AccountId
}

/// Lifecycle status of an account. Only active accounts take part in transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Closed,
    Frozen,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Closed => "closed",
            AccountStatus::Frozen => "frozen",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "closed" => Ok(AccountStatus::Closed),
            "frozen" => Ok(AccountStatus::Frozen),
            _ => Err(UnknownVariant::new("account status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Checking,
    Credit,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
            AccountType::Credit => "credit",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "savings" => Ok(AccountType::Savings),
            "checking" => Ok(AccountType::Checking),
            "credit" => Ok(AccountType::Credit),
            _ => Err(UnknownVariant::new("account type", s)),
        }
    }
}

/// A bank account owned by a user at a bank
///
/// Balances are two-digit fixed point and never negative. Accounts are never
/// physically removed; `is_deleted` marks a soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub bank_id: BankId,
    pub account_type: AccountType,
    pub status: AccountStatus,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub balance: Decimal,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active checking account with the given balance
    ///
    /// The id is a placeholder until the store assigns one on insert.
    pub fn new(user_id: UserId, bank_id: BankId, currency: &str, balance: Decimal) -> Self {
        let now = Utc::now().trunc_subsecs(6);
        Self {
            id: AccountId(0),
            user_id,
            bank_id,
            account_type: AccountType::Checking,
            status: AccountStatus::Active,
            currency: Self::normalize_currency(currency),
            balance,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True if the account may be debited or credited by a transfer.
    /// A soft-deleted account is treated like an inactive one.
    pub fn is_transferable(&self) -> bool {
        self.status == AccountStatus::Active && !self.is_deleted
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err("currency must be a three-letter ISO 4217 code");
        }
        if self.balance.is_sign_negative() && !self.balance.is_zero() {
            return Err("balance cannot be negative");
        }
        if self.balance.normalize().scale() > super::AMOUNT_SCALE {
            return Err("balance cannot have more than two fractional digits");
        }
        if self.balance > super::MAX_AMOUNT {
            return Err("balance exceeds the largest storable amount");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> Account {
        Account::new(UserId(1), BankId(1), "eur", balance)
    }

    #[test]
    fn test_currency_normalization() {
        assert_eq!(Account::normalize_currency("eur"), "EUR");
        assert_eq!(Account::normalize_currency(" usd "), "USD");
        assert_eq!(account(dec!(1)).currency, "EUR");
    }

    #[test]
    fn test_account_validation() {
        let mut account = account(dec!(100.00));
        assert!(account.validate().is_ok());

        account.balance = dec!(-0.01);
        assert!(account.validate().is_err());

        account.balance = dec!(1.005);
        assert!(account.validate().is_err());

        // Trailing zeros are not extra precision
        account.balance = dec!(1.000);
        assert!(account.validate().is_ok());

        account.balance = crate::domain::MAX_AMOUNT;
        assert!(account.validate().is_ok());
        account.balance = crate::domain::MAX_AMOUNT + dec!(0.01);
        assert!(account.validate().is_err());

        account.balance = dec!(1.00);
        account.currency = "EURO".to_string();
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_transferable() {
        let mut account = account(dec!(10));
        assert!(account.is_transferable());

        account.status = AccountStatus::Frozen;
        assert!(!account.is_transferable());

        account.status = AccountStatus::Active;
        account.is_deleted = true;
        assert!(!account.is_transferable());
    }

    #[test]
    fn test_status_round_trip_spelling() {
        assert_eq!("FROZEN".parse::<AccountStatus>().unwrap(), AccountStatus::Frozen);
        assert_eq!(AccountStatus::Closed.as_str(), "closed");
        assert!("dormant".parse::<AccountStatus>().is_err());
        assert_eq!("savings".parse::<AccountType>().unwrap(), AccountType::Savings);
    }
}
