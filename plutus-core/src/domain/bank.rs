//! Bank domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

row_id! {
    /// Primary key of a bank
    BankId
}

/// ISO 3166 codes of the euro area members that banks and users are seeded from
pub const EUROZONE_COUNTRIES: &[&str] = &[
    "AT", "BE", "HR", "CY", "EE", "FI", "FR", "DE", "GR", "IE", "IT", "LV", "LT", "LU", "MT",
    "NL", "PT", "SK", "SI", "ES",
];

/// A bank holding accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub id: BankId,
    pub name: String,
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
    pub currency: String,
    /// 8 or 11 character BIC (ISO 9362)
    pub bic_code: String,
    pub established_date: NaiveDate,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bank {
    /// Validate bank data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("bank name cannot be empty");
        }
        if self.country.len() != 2 {
            return Err("country must be a two-letter code");
        }
        if !Self::is_valid_bic(&self.bic_code) {
            return Err("BIC must be 8 or 11 alphanumeric characters");
        }
        Ok(())
    }

    /// BIC layout: 4 letter institution, 2 letter country, 2 char location,
    /// optional 3 char branch
    pub fn is_valid_bic(bic: &str) -> bool {
        if bic.len() != 8 && bic.len() != 11 {
            return false;
        }
        let bytes = bic.as_bytes();
        bytes[..6].iter().all(|b| b.is_ascii_uppercase())
            && bytes[6..].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bic_validation() {
        assert!(Bank::is_valid_bic("DEUTDEFF"));
        assert!(Bank::is_valid_bic("DEUTDEFF500"));
        assert!(!Bank::is_valid_bic("DEUTDEF"));
        assert!(!Bank::is_valid_bic("DEU1DEFF"));
        assert!(!Bank::is_valid_bic("deutdeff"));
    }
}
