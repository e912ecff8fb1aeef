//! Account store port - locked read/write access to balances

use rust_decimal::Decimal;

use crate::domain::result::Result;
use crate::domain::{Account, AccountId, TransactionId, TransactionRecord};

/// Account storage as seen by the transfer engine
///
/// Plain reads go through [`AccountStore::get`]. Every balance mutation goes
/// through a [`TransferUnit`] obtained from [`AccountStore::begin`].
pub trait AccountStore: Send + Sync {
    /// Read an account without taking its lock
    fn get(&self, id: AccountId) -> Result<Option<Account>>;

    /// Start an atomic unit of work
    fn begin(&self) -> Result<Box<dyn TransferUnit + '_>>;
}

/// One atomic unit of locked reads and staged writes
///
/// Row locks taken by the unit are held until it is committed or dropped.
/// Dropping an uncommitted unit discards its staged writes; every exit path
/// releases the locks.
pub trait TransferUnit {
    /// Lock the account row and read it fresh under the lock
    ///
    /// Blocks while another unit holds the row, up to the store's lock
    /// timeout (`Error::LockTimeout`). Within one unit ids must be requested
    /// in strictly ascending order (`Error::LockOrder`). Returns `None` if
    /// the account does not exist; the lock is still held until the unit ends.
    fn lock_for_update(&mut self, id: AccountId) -> Result<Option<Account>>;

    /// Stage an absolute balance write for an account locked by this unit
    fn update(&mut self, id: AccountId, new_balance: Decimal) -> Result<()>;

    /// Stage the transaction log append. The id is final once the unit commits.
    fn append(&mut self, record: &TransactionRecord) -> Result<TransactionId>;

    /// Apply all staged writes as one atomic unit and release the locks
    fn commit(self: Box<Self>) -> Result<()>;
}
