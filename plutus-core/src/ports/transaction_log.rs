//! Transaction log port - read side of the append-only transfer record

use crate::domain::result::Result;
use crate::domain::{AccountId, TransactionId, TransactionRecord};

/// Read access to the transaction log
///
/// The only write is [`TransferUnit::append`](super::TransferUnit::append),
/// staged inside the same unit as the balance writes. There is no update or
/// delete.
pub trait TransactionLog: Send + Sync {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>>;

    /// Transactions where the account is source or destination, oldest first
    fn transactions_for_account(&self, id: AccountId) -> Result<Vec<TransactionRecord>>;

    fn transaction_count(&self) -> Result<i64>;
}
