//! Transfer engine properties, checked against every store
//!
//! Run with: cargo test --test transfer_properties_test

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use plutus_core::adapters::duckdb::DuckDbRepository;
use plutus_core::adapters::memory::InMemoryStore;
use plutus_core::domain::{Account, AccountId, BankId, TransactionStatus, UserId, MAX_AMOUNT};
use plutus_core::ports::{AccountStore, TransactionLog};
use plutus_core::services::TransferService;
use plutus_core::Error;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// One store under test, seeded with accounts holding `balances`
struct Fixture {
    name: &'static str,
    store: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    ids: Vec<AccountId>,
    // Keeps the DuckDB file alive for the test
    _dir: Option<TempDir>,
}

impl Fixture {
    fn engine(&self) -> TransferService {
        TransferService::new(Arc::clone(&self.store))
    }

    fn balance(&self, id: AccountId) -> Decimal {
        self.store.get(id).unwrap().unwrap().balance
    }

    fn record_count(&self) -> i64 {
        self.log.transaction_count().unwrap()
    }
}

fn account(balance: Decimal) -> Account {
    Account::new(UserId(1), BankId(1), "EUR", balance)
}

fn memory_fixture(balances: &[Decimal]) -> Fixture {
    let store = Arc::new(InMemoryStore::new(LOCK_TIMEOUT));
    let ids = balances
        .iter()
        .map(|b| store.insert_account(account(*b)).unwrap())
        .collect();
    Fixture {
        name: "memory",
        store: store.clone(),
        log: store,
        ids,
        _dir: None,
    }
}

fn duckdb_fixture(balances: &[Decimal]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(DuckDbRepository::new(&dir.path().join("plutus.duckdb"), LOCK_TIMEOUT).unwrap());
    repo.ensure_schema().unwrap();
    let ids = balances
        .iter()
        .map(|b| repo.insert_account(&account(*b)).unwrap())
        .collect();
    Fixture {
        name: "duckdb",
        store: repo.clone(),
        log: repo,
        ids,
        _dir: Some(dir),
    }
}

fn fixtures(balances: &[Decimal]) -> Vec<Fixture> {
    vec![memory_fixture(balances), duckdb_fixture(balances)]
}

#[test]
fn test_happy_path() {
    for f in fixtures(&[dec!(1000.00), dec!(0.00)]) {
        let (a, b) = (f.ids[0], f.ids[1]);

        let record = f.engine().execute(a, b, dec!(250.00)).unwrap();

        assert_eq!(record.status, TransactionStatus::Completed, "{}", f.name);
        assert_eq!(f.balance(a), dec!(750.00), "{}", f.name);
        assert_eq!(f.balance(b), dec!(250.00), "{}", f.name);

        let stored = f.log.get_transaction(record.id).unwrap().unwrap();
        assert_eq!(stored, record, "{}", f.name);
    }
}

#[test]
fn test_insufficient_funds_leaves_balances_unchanged() {
    for f in fixtures(&[dec!(50.00), dec!(10.00)]) {
        let (a, b) = (f.ids[0], f.ids[1]);

        let record = f.engine().execute(a, b, dec!(100.00)).unwrap();

        assert_eq!(record.status, TransactionStatus::Failed, "{}", f.name);
        assert_eq!(
            record.failure_reason.as_ref().map(|r| r.code()),
            Some("insufficient_funds"),
            "{}",
            f.name
        );
        assert_eq!(f.balance(a), dec!(50.00), "{}", f.name);
        assert_eq!(f.balance(b), dec!(10.00), "{}", f.name);
        assert_eq!(f.record_count(), 1, "{}", f.name);
    }
}

#[test]
fn test_full_destination_is_recorded_failure() {
    for f in fixtures(&[dec!(100.00), MAX_AMOUNT]) {
        let (a, b) = (f.ids[0], f.ids[1]);

        let record = f.engine().execute(a, b, dec!(1.00)).unwrap();

        assert_eq!(record.status, TransactionStatus::Failed, "{}", f.name);
        assert_eq!(
            record.failure_reason.as_ref().map(|r| r.code()),
            Some("balance_limit_exceeded"),
            "{}",
            f.name
        );
        assert_eq!(f.balance(a), dec!(100.00), "{}", f.name);
        assert_eq!(f.balance(b), MAX_AMOUNT, "{}", f.name);
        assert_eq!(f.record_count(), 1, "{}", f.name);

        let stored = f.log.get_transaction(record.id).unwrap().unwrap();
        assert_eq!(stored, record, "{}", f.name);
    }
}

#[test]
fn test_self_transfer_rejected_without_record() {
    for f in fixtures(&[dec!(100.00)]) {
        let a = f.ids[0];

        let err = f.engine().execute(a, a, dec!(1.00)).unwrap_err();

        assert!(matches!(err, Error::InvalidTransfer(_)), "{}", f.name);
        assert_eq!(f.record_count(), 0, "{}", f.name);
        assert_eq!(f.balance(a), dec!(100.00), "{}", f.name);
    }
}

#[test]
fn test_each_valid_call_writes_one_terminal_record() {
    for f in fixtures(&[dec!(100.00), dec!(100.00)]) {
        let (a, b) = (f.ids[0], f.ids[1]);
        let engine = f.engine();

        let amounts = [dec!(30.00), dec!(80.00), dec!(70.00), dec!(0.01), dec!(500.00)];
        for amount in amounts {
            engine.execute(a, b, amount).unwrap();
        }

        let records = f.log.transactions_for_account(a).unwrap();
        assert_eq!(records.len(), amounts.len(), "{}", f.name);
        assert!(records.iter().all(|r| r.is_terminal()), "{}", f.name);

        // 30 and 70 move; 80, 0.01 and 500 find too little left
        assert_eq!(f.balance(a), dec!(0.00), "{}", f.name);
        assert_eq!(f.balance(b), dec!(200.00), "{}", f.name);
        let failed = records
            .iter()
            .filter(|r| r.status == TransactionStatus::Failed)
            .count();
        assert_eq!(failed, 3, "{}", f.name);
    }
}

#[test]
fn test_missing_account_is_not_found() {
    for f in fixtures(&[dec!(100.00)]) {
        let a = f.ids[0];

        let err = f.engine().execute(a, AccountId(999), dec!(1.00)).unwrap_err();

        assert!(matches!(err, Error::NotFound(_)), "{}", f.name);
        assert_eq!(f.record_count(), 0, "{}", f.name);
        assert_eq!(f.balance(a), dec!(100.00), "{}", f.name);
    }
}

#[test]
fn test_conservation_over_mixed_outcomes() {
    for f in fixtures(&[dec!(120.00), dec!(45.50), dec!(0.00), dec!(999.99)]) {
        let engine = f.engine();
        let total = |f: &Fixture| f.ids.iter().map(|id| f.balance(*id)).sum::<Decimal>();
        let before = total(&f);

        for (i, amount) in [dec!(60.00), dec!(45.50), dec!(200.00), dec!(0.99), dec!(1000.00)]
            .into_iter()
            .enumerate()
        {
            let from = f.ids[i % f.ids.len()];
            let to = f.ids[(i + 1) % f.ids.len()];
            engine.execute(from, to, amount).unwrap();
        }

        assert_eq!(total(&f), before, "{}", f.name);
        assert!(
            f.ids.iter().all(|id| f.balance(*id) >= Decimal::ZERO),
            "{}",
            f.name
        );
        assert_eq!(f.record_count(), 5, "{}", f.name);
    }
}
