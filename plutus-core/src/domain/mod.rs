//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

/// Integer primary key newtype with Display and From<i64>
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

mod account;
mod bank;
mod transaction;
mod user;
pub mod result;

pub use account::{Account, AccountId, AccountStatus, AccountType};
pub use bank::{Bank, BankId, EUROZONE_COUNTRIES};
pub use transaction::{
    FailureReason, TransactionId, TransactionRecord, TransactionStatus, TransactionType,
    TransferRequest, AMOUNT_SCALE, MAX_AMOUNT,
};
pub use user::{User, UserId};
