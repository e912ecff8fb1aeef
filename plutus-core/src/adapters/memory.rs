//! In-process account store
//!
//! Holds accounts and the transaction log in memory. Used by tests and by
//! simulations that do not need a database file. Row locks behave exactly
//! like the DuckDB store's, so engine behavior is identical on both.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;

use super::row_lock::{HeldLocks, RowLocks};
use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountId, AccountStatus, TransactionId, TransactionRecord,
};
use crate::ports::{AccountStore, TransactionLog, TransferUnit};

/// Default wait for a row lock before giving up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Account store backed by process memory
pub struct InMemoryStore {
    accounts: Mutex<BTreeMap<AccountId, Account>>,
    transactions: Mutex<Vec<TransactionRecord>>,
    next_account_id: AtomicI64,
    next_transaction_id: AtomicI64,
    locks: RowLocks,
    lock_timeout: Duration,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: Mutex::new(BTreeMap::new()),
            transactions: Mutex::new(Vec::new()),
            next_account_id: AtomicI64::new(1),
            next_transaction_id: AtomicI64::new(1),
            locks: RowLocks::new(),
            lock_timeout,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the backing store.
    /// While unavailable every call fails with `Error::StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::unavailable("in-memory store is offline"))
        }
    }

    fn lock_accounts(&self) -> Result<MutexGuard<'_, BTreeMap<AccountId, Account>>> {
        self.accounts
            .lock()
            .map_err(|_| Error::unavailable("account table poisoned"))
    }

    fn lock_transactions(&self) -> Result<MutexGuard<'_, Vec<TransactionRecord>>> {
        self.transactions
            .lock()
            .map_err(|_| Error::unavailable("transaction log poisoned"))
    }

    /// Insert an account, assigning the next id
    pub fn insert_account(&self, mut account: Account) -> Result<AccountId> {
        self.check_available()?;
        account.validate().map_err(Error::validation)?;

        let id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
        account.id = id;
        self.lock_accounts()?.insert(id, account);
        Ok(id)
    }

    /// Administrative status change. Takes the row lock so it never
    /// interleaves with a transfer touching the same account.
    pub fn set_account_status(&self, id: AccountId, status: AccountStatus) -> Result<()> {
        self.check_available()?;
        let _guard = self.locks.acquire(id, self.lock_timeout)?;
        let mut accounts = self.lock_accounts()?;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("account {}", id)))?;
        account.status = status;
        account.updated_at = Utc::now();
        Ok(())
    }

    /// Soft delete: the row stays, flagged and timestamped
    pub fn soft_delete_account(&self, id: AccountId) -> Result<()> {
        self.check_available()?;
        let _guard = self.locks.acquire(id, self.lock_timeout)?;
        let mut accounts = self.lock_accounts()?;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("account {}", id)))?;
        let now = Utc::now();
        account.is_deleted = true;
        account.deleted_at = Some(now);
        account.updated_at = now;
        Ok(())
    }

    /// Snapshot of all accounts, ordered by id
    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.check_available()?;
        Ok(self.lock_accounts()?.values().cloned().collect())
    }

    /// Snapshot of the whole log, in append order
    pub fn transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.check_available()?;
        Ok(self.lock_transactions()?.clone())
    }

    /// Sum of every account balance
    pub fn total_balance(&self) -> Result<Decimal> {
        self.check_available()?;
        Ok(self.lock_accounts()?.values().map(|a| a.balance).sum())
    }
}

impl AccountStore for InMemoryStore {
    fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.check_available()?;
        Ok(self.lock_accounts()?.get(&id).cloned())
    }

    fn begin(&self) -> Result<Box<dyn TransferUnit + '_>> {
        self.check_available()?;
        Ok(Box::new(MemoryUnit {
            store: self,
            held: HeldLocks::new(),
            balances: Vec::new(),
            appended: Vec::new(),
        }))
    }
}

impl TransactionLog for InMemoryStore {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        self.check_available()?;
        Ok(self.lock_transactions()?.iter().find(|t| t.id == id).cloned())
    }

    fn transactions_for_account(&self, id: AccountId) -> Result<Vec<TransactionRecord>> {
        self.check_available()?;
        Ok(self
            .lock_transactions()?
            .iter()
            .filter(|t| t.from_account_id == id || t.to_account_id == id)
            .cloned()
            .collect())
    }

    fn transaction_count(&self) -> Result<i64> {
        self.check_available()?;
        Ok(self.lock_transactions()?.len() as i64)
    }
}

/// Unit of work over [`InMemoryStore`]; writes are staged until commit
struct MemoryUnit<'a> {
    store: &'a InMemoryStore,
    held: HeldLocks<'a>,
    balances: Vec<(AccountId, Decimal)>,
    appended: Vec<TransactionRecord>,
}

impl TransferUnit for MemoryUnit<'_> {
    fn lock_for_update(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.store.check_available()?;
        self.held.acquire(&self.store.locks, id, self.store.lock_timeout)?;
        Ok(self.store.lock_accounts()?.get(&id).cloned())
    }

    fn update(&mut self, id: AccountId, new_balance: Decimal) -> Result<()> {
        self.store.check_available()?;
        self.held.ensure_held(id)?;
        if new_balance < Decimal::ZERO {
            return Err(Error::validation(format!(
                "balance of account {} would become negative ({})",
                id, new_balance
            )));
        }
        self.balances.push((id, new_balance));
        Ok(())
    }

    fn append(&mut self, record: &TransactionRecord) -> Result<TransactionId> {
        self.store.check_available()?;
        record.validate().map_err(Error::validation)?;

        let id = TransactionId(self.store.next_transaction_id.fetch_add(1, Ordering::SeqCst));
        let mut record = record.clone();
        record.id = id;
        self.appended.push(record);
        Ok(id)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.store.check_available()?;

        // accounts before transactions, everywhere both are held
        let mut accounts = self.store.lock_accounts()?;
        let mut transactions = self.store.lock_transactions()?;

        for (id, _) in &self.balances {
            if !accounts.contains_key(id) {
                return Err(Error::not_found(format!("account {}", id)));
            }
        }

        let now = Utc::now();
        for (id, balance) in &self.balances {
            if let Some(account) = accounts.get_mut(id) {
                account.balance = *balance;
                account.updated_at = now;
            }
        }
        transactions.extend(self.appended.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BankId, TransferRequest, UserId};
    use rust_decimal_macros::dec;

    fn store_with(balances: &[Decimal]) -> (InMemoryStore, Vec<AccountId>) {
        let store = InMemoryStore::default();
        let ids = balances
            .iter()
            .map(|b| {
                store
                    .insert_account(Account::new(UserId(1), BankId(1), "EUR", *b))
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let (store, ids) = store_with(&[dec!(1), dec!(2), dec!(3)]);
        assert_eq!(ids, vec![AccountId(1), AccountId(2), AccountId(3)]);
        assert_eq!(store.get(AccountId(2)).unwrap().unwrap().balance, dec!(2));
    }

    #[test]
    fn test_insert_accepts_trailing_zero_balance() {
        let (store, ids) = store_with(&[dec!(1.000)]);
        assert_eq!(store.get(ids[0]).unwrap().unwrap().balance, dec!(1.00));
        assert!(store
            .insert_account(Account::new(UserId(1), BankId(1), "EUR", dec!(1.005)))
            .is_err());
    }

    #[test]
    fn test_dropped_unit_discards_writes_and_releases_locks() {
        let (store, ids) = store_with(&[dec!(100.00), dec!(0.00)]);
        {
            let mut unit = store.begin().unwrap();
            unit.lock_for_update(ids[0]).unwrap();
            unit.lock_for_update(ids[1]).unwrap();
            unit.update(ids[0], dec!(0.00)).unwrap();
            unit.update(ids[1], dec!(100.00)).unwrap();
            // dropped without commit
        }
        assert_eq!(store.get(ids[0]).unwrap().unwrap().balance, dec!(100.00));
        assert_eq!(store.get(ids[1]).unwrap().unwrap().balance, dec!(0.00));
        assert!(!store.locks.is_locked(ids[0]));
        assert!(!store.locks.is_locked(ids[1]));
    }

    #[test]
    fn test_commit_applies_balances_and_log_together() {
        let (store, ids) = store_with(&[dec!(100.00), dec!(0.00)]);
        let request = TransferRequest::new(ids[0], ids[1], dec!(40)).unwrap();

        let mut unit = store.begin().unwrap();
        unit.lock_for_update(ids[0]).unwrap();
        unit.lock_for_update(ids[1]).unwrap();
        unit.update(ids[0], dec!(60.00)).unwrap();
        unit.update(ids[1], dec!(40.00)).unwrap();
        let tx_id = unit
            .append(&TransactionRecord::completed(&request, "EUR"))
            .unwrap();
        unit.commit().unwrap();

        assert_eq!(store.get(ids[0]).unwrap().unwrap().balance, dec!(60.00));
        assert_eq!(store.get(ids[1]).unwrap().unwrap().balance, dec!(40.00));
        let stored = store.get_transaction(tx_id).unwrap().unwrap();
        assert!(stored.is_completed());
        assert_eq!(store.transactions_for_account(ids[1]).unwrap().len(), 1);
    }

    #[test]
    fn test_update_requires_lock_and_non_negative_balance() {
        let (store, ids) = store_with(&[dec!(10.00), dec!(10.00)]);
        let mut unit = store.begin().unwrap();

        assert!(matches!(
            unit.update(ids[0], dec!(5.00)),
            Err(Error::LockOrder(_))
        ));

        unit.lock_for_update(ids[0]).unwrap();
        assert!(matches!(
            unit.update(ids[0], dec!(-0.01)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_unavailable_store_fails_every_call() {
        let (store, ids) = store_with(&[dec!(10.00)]);
        store.set_available(false);

        assert!(matches!(store.get(ids[0]), Err(Error::StoreUnavailable(_))));
        assert!(matches!(store.begin(), Err(Error::StoreUnavailable(_))));

        store.set_available(true);
        assert!(store.get(ids[0]).unwrap().is_some());
    }

    #[test]
    fn test_admin_status_change_and_soft_delete() {
        let (store, ids) = store_with(&[dec!(10.00)]);
        store.set_account_status(ids[0], AccountStatus::Frozen).unwrap();
        assert_eq!(
            store.get(ids[0]).unwrap().unwrap().status,
            AccountStatus::Frozen
        );

        store.soft_delete_account(ids[0]).unwrap();
        let account = store.get(ids[0]).unwrap().unwrap();
        assert!(account.is_deleted);
        assert!(account.deleted_at.is_some());

        assert!(matches!(
            store.set_account_status(AccountId(99), AccountStatus::Active),
            Err(Error::NotFound(_))
        ));
    }
}
