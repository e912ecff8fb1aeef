//! Transfer service - moves funds between two accounts
//!
//! Each call runs as one unit of work on the account store:
//!
//! 1. lock both accounts in ascending id order, whatever the direction
//! 2. re-read both rows under the locks
//! 3. check status, currency, funds and room in the destination balance
//! 4. stage the balance writes (completed only) and the log record
//! 5. commit everything at once
//!
//! A refused business check produces a committed `failed` record and `Ok`.
//! Bad input and infrastructure faults return `Err` and leave nothing behind.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountId, FailureReason, TransactionRecord, TransferRequest, MAX_AMOUNT,
};
use crate::ports::AccountStore;

/// The transfer engine
///
/// Cheap to clone and safe to share between threads. All instances built on
/// the same store are serialized per account by the store's row locks.
#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn AccountStore>,
}

impl TransferService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Move `amount` from `from` to `to`
    ///
    /// Returns the terminal record that was written. A record with status
    /// `failed` is a normal outcome; inspect `failure_reason`.
    pub fn execute(&self, from: AccountId, to: AccountId, amount: Decimal) -> Result<TransactionRecord> {
        let request = TransferRequest::new(from, to, amount)?;
        self.execute_request(&request)
    }

    /// Execute an already validated request
    pub fn execute_request(&self, request: &TransferRequest) -> Result<TransactionRecord> {
        match self.run(request) {
            Ok(record) => {
                if record.is_completed() {
                    info!(
                        transaction_id = %record.id,
                        from = %request.from,
                        to = %request.to,
                        amount = %request.amount,
                        "transfer completed"
                    );
                } else {
                    info!(
                        transaction_id = %record.id,
                        from = %request.from,
                        to = %request.to,
                        reason = record.failure_reason.as_ref().map(|r| r.code()).unwrap_or_default(),
                        "transfer failed"
                    );
                }
                Ok(record)
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(from = %request.from, to = %request.to, error = %e, "transfer aborted");
                }
                Err(e)
            }
        }
    }

    fn run(&self, request: &TransferRequest) -> Result<TransactionRecord> {
        let mut unit = self.store.begin()?;

        let [first, second] = request.lock_order();
        let first_row = unit.lock_for_update(first)?;
        let second_row = unit.lock_for_update(second)?;
        debug!(first = %first, second = %second, "row locks acquired");

        let (source, destination) = if first == request.from {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };
        let source = source.ok_or_else(|| Error::not_found(format!("account {}", request.from)))?;
        let destination =
            destination.ok_or_else(|| Error::not_found(format!("account {}", request.to)))?;

        let mut record = match check_transfer(&source, &destination, request.amount) {
            Ok(()) => {
                unit.update(source.id, source.balance - request.amount)?;
                unit.update(destination.id, destination.balance + request.amount)?;
                TransactionRecord::completed(request, &source.currency)
            }
            Err(reason) => TransactionRecord::failed(request, &source.currency, reason),
        };

        record.id = unit.append(&record)?;
        unit.commit()?;
        Ok(record)
    }
}

/// Business checks on freshly locked rows: active, then currency, then funds,
/// then room in the destination balance
fn check_transfer(
    source: &Account,
    destination: &Account,
    amount: Decimal,
) -> std::result::Result<(), FailureReason> {
    for account in [source, destination] {
        if !account.is_transferable() {
            return Err(FailureReason::AccountNotActive {
                account_id: account.id,
                status: account.status,
                is_deleted: account.is_deleted,
            });
        }
    }

    if source.currency != destination.currency {
        return Err(FailureReason::CurrencyMismatch {
            source_currency: source.currency.clone(),
            destination_currency: destination.currency.clone(),
        });
    }

    if source.balance < amount {
        return Err(FailureReason::InsufficientFunds {
            available: source.balance,
            requested: amount,
        });
    }

    if destination.balance + amount > MAX_AMOUNT {
        return Err(FailureReason::BalanceLimitExceeded {
            account_id: destination.id,
            limit: MAX_AMOUNT,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use crate::adapters::memory::InMemoryStore;
    use crate::domain::{
        AccountStatus, BankId, TransactionId, TransactionStatus, UserId,
    };
    use crate::ports::{TransactionLog, TransferUnit};

    fn setup(balances: &[Decimal]) -> (Arc<InMemoryStore>, TransferService, Vec<AccountId>) {
        let store = Arc::new(InMemoryStore::default());
        let ids = balances
            .iter()
            .map(|b| {
                store
                    .insert_account(Account::new(UserId(1), BankId(1), "EUR", *b))
                    .unwrap()
            })
            .collect();
        let service = TransferService::new(store.clone());
        (store, service, ids)
    }

    fn balance(store: &InMemoryStore, id: AccountId) -> Decimal {
        store.get(id).unwrap().unwrap().balance
    }

    #[test]
    fn test_happy_path() {
        let (store, service, ids) = setup(&[dec!(1000.00), dec!(0.00)]);

        let record = service.execute(ids[0], ids[1], dec!(250.00)).unwrap();

        assert_eq!(record.status, TransactionStatus::Completed);
        assert_eq!(record.amount, dec!(250.00));
        assert_eq!(record.currency, "EUR");
        assert_ne!(record.id, TransactionId(0));
        assert_eq!(balance(&store, ids[0]), dec!(750.00));
        assert_eq!(balance(&store, ids[1]), dec!(250.00));
        assert_eq!(store.get_transaction(record.id).unwrap(), Some(record));
    }

    #[test]
    fn test_insufficient_funds_is_recorded() {
        let (store, service, ids) = setup(&[dec!(50.00), dec!(10.00)]);

        let record = service.execute(ids[0], ids[1], dec!(100.00)).unwrap();

        assert_eq!(record.status, TransactionStatus::Failed);
        assert_eq!(
            record.failure_reason,
            Some(FailureReason::InsufficientFunds {
                available: dec!(50.00),
                requested: dec!(100.00),
            })
        );
        assert_eq!(balance(&store, ids[0]), dec!(50.00));
        assert_eq!(balance(&store, ids[1]), dec!(10.00));
        assert_eq!(store.transaction_count().unwrap(), 1);
    }

    #[test]
    fn test_exact_balance_can_be_sent() {
        let (store, service, ids) = setup(&[dec!(42.42), dec!(0.00)]);

        let record = service.execute(ids[0], ids[1], dec!(42.42)).unwrap();

        assert!(record.is_completed());
        assert_eq!(balance(&store, ids[0]), dec!(0.00));
    }

    #[test]
    fn test_reverse_direction_locks_ascending() {
        let (store, service, ids) = setup(&[dec!(0.00), dec!(80.00)]);

        let record = service.execute(ids[1], ids[0], dec!(30)).unwrap();

        assert!(record.is_completed());
        assert_eq!(record.from_account_id, ids[1]);
        assert_eq!(balance(&store, ids[0]), dec!(30.00));
        assert_eq!(balance(&store, ids[1]), dec!(50.00));
    }

    #[test]
    fn test_invalid_input_writes_nothing() {
        let (store, service, ids) = setup(&[dec!(100.00), dec!(0.00)]);

        for (from, to, amount) in [
            (ids[0], ids[0], dec!(1.00)),
            (ids[0], ids[1], dec!(0)),
            (ids[0], ids[1], dec!(-5.00)),
            (ids[0], ids[1], dec!(0.001)),
        ] {
            let err = service.execute(from, to, amount).unwrap_err();
            assert!(matches!(err, Error::InvalidTransfer(_)), "{:?}", err);
            assert!(!err.is_retryable());
        }
        assert_eq!(store.transaction_count().unwrap(), 0);
        assert_eq!(balance(&store, ids[0]), dec!(100.00));
    }

    #[test]
    fn test_missing_account_is_not_found() {
        let (store, service, ids) = setup(&[dec!(100.00)]);

        let err = service.execute(ids[0], AccountId(999), dec!(1)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = service.execute(AccountId(999), ids[0], dec!(1)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[test]
    fn test_inactive_accounts_fail() {
        for status in [AccountStatus::Frozen, AccountStatus::Closed] {
            let (store, service, ids) = setup(&[dec!(100.00), dec!(0.00)]);
            store.set_account_status(ids[1], status).unwrap();

            let record = service.execute(ids[0], ids[1], dec!(10)).unwrap();

            assert_eq!(record.status, TransactionStatus::Failed);
            assert_eq!(
                record.failure_reason,
                Some(FailureReason::AccountNotActive {
                    account_id: ids[1],
                    status,
                    is_deleted: false,
                })
            );
            assert_eq!(balance(&store, ids[0]), dec!(100.00));
        }
    }

    #[test]
    fn test_soft_deleted_account_is_not_active() {
        let (store, service, ids) = setup(&[dec!(100.00), dec!(0.00)]);
        store.soft_delete_account(ids[0]).unwrap();

        let record = service.execute(ids[0], ids[1], dec!(10)).unwrap();

        assert!(matches!(
            record.failure_reason,
            Some(FailureReason::AccountNotActive { is_deleted: true, .. })
        ));
        assert_eq!(balance(&store, ids[0]), dec!(100.00));
    }

    #[test]
    fn test_status_checked_before_funds() {
        let (store, service, ids) = setup(&[dec!(5.00), dec!(0.00)]);
        store.set_account_status(ids[0], AccountStatus::Frozen).unwrap();

        let record = service.execute(ids[0], ids[1], dec!(10)).unwrap();

        assert_eq!(
            record.failure_reason.as_ref().map(|r| r.code()),
            Some("account_not_active")
        );
    }

    #[test]
    fn test_currency_mismatch_fails() {
        let store = Arc::new(InMemoryStore::default());
        let eur = store
            .insert_account(Account::new(UserId(1), BankId(1), "EUR", dec!(100.00)))
            .unwrap();
        let usd = store
            .insert_account(Account::new(UserId(1), BankId(1), "USD", dec!(0.00)))
            .unwrap();
        let service = TransferService::new(store.clone());

        let record = service.execute(eur, usd, dec!(10)).unwrap();

        assert_eq!(record.currency, "EUR");
        assert_eq!(
            record.failure_reason,
            Some(FailureReason::CurrencyMismatch {
                source_currency: "EUR".to_string(),
                destination_currency: "USD".to_string(),
            })
        );
        assert_eq!(balance(&store, usd), dec!(0.00));
    }

    #[test]
    fn test_destination_balance_limit_is_recorded() {
        let (store, service, ids) = setup(&[dec!(100.00), MAX_AMOUNT - dec!(0.50)]);

        let record = service.execute(ids[0], ids[1], dec!(1.00)).unwrap();

        assert_eq!(record.status, TransactionStatus::Failed);
        assert_eq!(
            record.failure_reason,
            Some(FailureReason::BalanceLimitExceeded {
                account_id: ids[1],
                limit: MAX_AMOUNT,
            })
        );
        assert_eq!(balance(&store, ids[0]), dec!(100.00));
        assert_eq!(balance(&store, ids[1]), MAX_AMOUNT - dec!(0.50));
        assert_eq!(store.transaction_count().unwrap(), 1);

        // Filling the destination exactly to the limit is allowed
        let record = service.execute(ids[0], ids[1], dec!(0.50)).unwrap();
        assert!(record.is_completed());
        assert_eq!(balance(&store, ids[1]), MAX_AMOUNT);
    }

    #[test]
    fn test_unavailable_store_propagates() {
        let (store, service, ids) = setup(&[dec!(100.00), dec!(0.00)]);
        store.set_available(false);

        let err = service.execute(ids[0], ids[1], dec!(10)).unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert!(err.is_retryable());

        store.set_available(true);
        assert_eq!(store.transaction_count().unwrap(), 0);
        assert_eq!(balance(&store, ids[0]), dec!(100.00));
    }

    #[test]
    fn test_lock_timeout_leaves_no_trace() {
        let store = Arc::new(InMemoryStore::new(Duration::from_millis(30)));
        let a = store
            .insert_account(Account::new(UserId(1), BankId(1), "EUR", dec!(100.00)))
            .unwrap();
        let b = store
            .insert_account(Account::new(UserId(1), BankId(1), "EUR", dec!(0.00)))
            .unwrap();
        let service = TransferService::new(store.clone());

        let mut blocker = store.begin().unwrap();
        blocker.lock_for_update(b).unwrap();

        let err = service.execute(a, b, dec!(10)).unwrap_err();
        assert!(matches!(err, Error::LockTimeout(id) if id == b));
        drop(blocker);

        assert_eq!(store.transaction_count().unwrap(), 0);
        assert_eq!(balance(&store, a), dec!(100.00));

        // Lock on `a` was released with the aborted unit
        assert!(service.execute(a, b, dec!(10)).unwrap().is_completed());
    }

    /// Store whose units fail at commit while `fail` is set
    struct FailingCommitStore {
        inner: InMemoryStore,
        fail: AtomicBool,
    }

    struct FailingUnit<'a> {
        inner: Box<dyn TransferUnit + 'a>,
        fail: bool,
    }

    impl AccountStore for FailingCommitStore {
        fn get(&self, id: AccountId) -> Result<Option<Account>> {
            self.inner.get(id)
        }

        fn begin(&self) -> Result<Box<dyn TransferUnit + '_>> {
            Ok(Box::new(FailingUnit {
                inner: self.inner.begin()?,
                fail: self.fail.load(Ordering::SeqCst),
            }))
        }
    }

    impl TransferUnit for FailingUnit<'_> {
        fn lock_for_update(&mut self, id: AccountId) -> Result<Option<Account>> {
            self.inner.lock_for_update(id)
        }

        fn update(&mut self, id: AccountId, new_balance: Decimal) -> Result<()> {
            self.inner.update(id, new_balance)
        }

        fn append(&mut self, record: &TransactionRecord) -> Result<TransactionId> {
            self.inner.append(record)
        }

        fn commit(self: Box<Self>) -> Result<()> {
            if self.fail {
                return Err(Error::database("connection reset during commit"));
            }
            self.inner.commit()
        }
    }

    #[test]
    fn test_commit_failure_applies_nothing() {
        let store = Arc::new(FailingCommitStore {
            inner: InMemoryStore::default(),
            fail: AtomicBool::new(true),
        });
        let a = store
            .inner
            .insert_account(Account::new(UserId(1), BankId(1), "EUR", dec!(100.00)))
            .unwrap();
        let b = store
            .inner
            .insert_account(Account::new(UserId(1), BankId(1), "EUR", dec!(0.00)))
            .unwrap();
        let service = TransferService::new(store.clone());

        let err = service.execute(a, b, dec!(60)).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.inner.transaction_count().unwrap(), 0);
        assert_eq!(balance(&store.inner, a), dec!(100.00));
        assert_eq!(balance(&store.inner, b), dec!(0.00));

        // Retrying the whole call is safe
        store.fail.store(false, Ordering::SeqCst);
        let record = service.execute(a, b, dec!(60)).unwrap();
        assert!(record.is_completed());
        assert_eq!(balance(&store.inner, a), dec!(40.00));
        assert_eq!(store.inner.transaction_count().unwrap(), 1);
    }
}
