//! User domain model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

row_id! {
    /// Primary key of a user
    UserId
}

/// An account holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub country: String,
    pub nationality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("user name cannot be empty");
        }
        if self.country.len() != 2 || self.nationality.len() != 2 {
            return Err("country and nationality must be two-letter codes");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_validation() {
        let now = Utc::now();
        let mut user = User {
            id: UserId(1),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            country: "IE".to_string(),
            nationality: "IE".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(user.validate().is_ok());
        assert_eq!(user.full_name(), "Ada Lovelace");

        user.first_name = " ".to_string();
        assert!(user.validate().is_err());
    }
}
