//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The transfer
//! engine depends only on these traits, not on concrete stores.

mod store;
mod transaction_log;

pub use store::{AccountStore, TransferUnit};
pub use transaction_log::TransactionLog;
