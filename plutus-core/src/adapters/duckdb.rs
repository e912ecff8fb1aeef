//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection};
use rust_decimal::Decimal;

use super::row_lock::{HeldLocks, RowLocks};
use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountId, AccountStatus, Bank, BankId, FailureReason, TransactionId,
    TransactionRecord, TransactionStatus, User, UserId,
};
use crate::ports::{AccountStore, TransactionLog, TransferUnit};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Text layout used when binding timestamps
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const ACCOUNT_COLUMNS: &str = "account_id, user_id, bank_id, account_type, status, currency,
     CAST(balance AS VARCHAR), is_deleted, CAST(deleted_at AS VARCHAR),
     CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

const TRANSACTION_COLUMNS: &str = "transaction_id, from_account_id, to_account_id,
     CAST(amount AS VARCHAR), currency, transaction_type, status, failure_reason,
     CAST(timestamp AS VARCHAR), CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Persistent account store and transaction log
///
/// All SQL runs on one connection behind a mutex. Row locks are kept in a
/// [`RowLocks`] table owned by the repository, so every engine sharing an
/// `Arc<DuckDbRepository>` is serialized per account.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    locks: RowLocks,
    lock_timeout: Duration,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Retries with exponential backoff while another process holds the
    /// file. Does not run migrations; call [`Self::ensure_schema`].
    pub fn new(db_path: &Path, lock_timeout: Duration) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                        locks: RowLocks::new(),
                        lock_timeout,
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            delay_ms = delay.as_millis() as u64,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(Error::unavailable(err_msg));
                }
            }
        }

        Err(last_error
            .map(|e| Error::unavailable(e.to_string()))
            .unwrap_or_else(|| {
                Error::unavailable(format!(
                    "failed to open database after {} retries",
                    MAX_RETRIES
                ))
            }))
    }

    /// Open a private in-memory database
    pub fn open_in_memory(lock_timeout: Duration) -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
            locks: RowLocks::new(),
            lock_timeout,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Autoloaded extensions from ~/.duckdb are not wanted here
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::unavailable("database connection poisoned"))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    // === Seeding ===

    pub fn insert_bank(&self, bank: &Bank) -> Result<BankId> {
        bank.validate().map_err(Error::validation)?;
        let conn = self.conn()?;
        let id = next_id(&conn, "seq_banks")?;
        conn.execute(
            "INSERT INTO banks (bank_id, name, country, currency, bic_code, established_date,
                                total_assets, total_liabilities, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DECIMAL(20,2)),
                     CAST(? AS DECIMAL(20,2)), CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                id,
                bank.name,
                bank.country,
                bank.currency,
                bank.bic_code,
                format_date(bank.established_date),
                bank.total_assets.to_string(),
                bank.total_liabilities.to_string(),
                format_timestamp(bank.created_at),
                format_timestamp(bank.updated_at),
            ],
        )?;
        Ok(BankId(id))
    }

    pub fn insert_user(&self, user: &User) -> Result<UserId> {
        user.validate().map_err(Error::validation)?;
        let conn = self.conn()?;
        let id = next_id(&conn, "seq_users")?;
        conn.execute(
            "INSERT INTO users (user_id, first_name, last_name, date_of_birth, country, nationality,
                                created_at, updated_at)
             VALUES (?, ?, ?, CAST(? AS DATE), ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                id,
                user.first_name,
                user.last_name,
                format_date(user.date_of_birth),
                user.country,
                user.nationality,
                format_timestamp(user.created_at),
                format_timestamp(user.updated_at),
            ],
        )?;
        Ok(UserId(id))
    }

    /// Insert an account; the database assigns the id
    pub fn insert_account(&self, account: &Account) -> Result<AccountId> {
        account.validate().map_err(Error::validation)?;
        let conn = self.conn()?;
        let id = next_id(&conn, "seq_accounts")?;
        conn.execute(
            "INSERT INTO accounts (account_id, user_id, bank_id, account_type, status, currency, balance,
                                   is_deleted, deleted_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS DECIMAL(18,2)), ?, CAST(? AS TIMESTAMP),
                     CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                id,
                account.user_id.get(),
                account.bank_id.get(),
                account.account_type.as_str(),
                account.status.as_str(),
                account.currency,
                account.balance.to_string(),
                account.is_deleted,
                account.deleted_at.map(format_timestamp),
                format_timestamp(account.created_at),
                format_timestamp(account.updated_at),
            ],
        )?;
        Ok(AccountId(id))
    }

    pub fn random_bank_id(&self) -> Result<Option<BankId>> {
        self.random_id("SELECT bank_id FROM banks ORDER BY random() LIMIT 1")
            .map(|id| id.map(BankId))
    }

    pub fn random_user_id(&self) -> Result<Option<UserId>> {
        self.random_id("SELECT user_id FROM users ORDER BY random() LIMIT 1")
            .map(|id| id.map(UserId))
    }

    fn random_id(&self, sql: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Two distinct accounts picked at random, if at least two exist
    pub fn random_account_pair(&self) -> Result<Option<(AccountId, AccountId)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT account_id FROM accounts ORDER BY random() LIMIT 2")?;
        let ids: Vec<i64> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<duckdb::Result<_>>()?;
        match ids.as_slice() {
            [a, b] => Ok(Some((AccountId(*a), AccountId(*b)))),
            _ => Ok(None),
        }
    }

    // === Accounts ===

    pub fn get_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts ORDER BY account_id",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<duckdb::Result<_>>()?;
        Ok(accounts)
    }

    pub fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE account_id = ?",
            ACCOUNT_COLUMNS
        ))?;
        let mut rows = stmt.query(params![id.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_account(row)?)),
            None => Ok(None),
        }
    }

    /// Administrative status change, serialized with transfers by the row lock
    pub fn set_account_status(&self, id: AccountId, status: AccountStatus) -> Result<()> {
        let _guard = self.locks.acquire(id, self.lock_timeout)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE accounts SET status = ?, updated_at = CAST(? AS TIMESTAMP)
             WHERE account_id = ?",
            params![status.as_str(), format_timestamp(Utc::now()), id.get()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("account {}", id)));
        }
        Ok(())
    }

    /// Soft delete: the row is kept and flagged
    pub fn soft_delete_account(&self, id: AccountId) -> Result<()> {
        let _guard = self.locks.acquire(id, self.lock_timeout)?;
        let conn = self.conn()?;
        let now = format_timestamp(Utc::now());
        let changed = conn.execute(
            "UPDATE accounts
             SET is_deleted = TRUE, deleted_at = CAST(? AS TIMESTAMP), updated_at = CAST(? AS TIMESTAMP)
             WHERE account_id = ?",
            params![now, now, id.get()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("account {}", id)));
        }
        Ok(())
    }

    // === Counts ===

    pub fn count_banks(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM banks")
    }

    pub fn count_users(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM users")
    }

    pub fn count_accounts(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM accounts")
    }

    fn count(&self, sql: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of transactions per status, in status order
    pub fn transaction_counts_by_status(&self) -> Result<Vec<(TransactionStatus, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM transactions GROUP BY status ORDER BY status",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok((parse_column(row, 0, TransactionStatus::from_str)?, row.get(1)?))
            })?
            .collect::<duckdb::Result<_>>()?;
        Ok(counts)
    }

    /// Sum of all balances, deleted accounts included
    pub fn total_balance(&self) -> Result<Decimal> {
        let conn = self.conn()?;
        let total = conn.query_row(
            "SELECT CAST(COALESCE(SUM(balance), 0) AS VARCHAR) FROM accounts",
            [],
            |row| parse_column(row, 0, parse_decimal),
        )?;
        Ok(total)
    }

    pub fn get_db_size(&self) -> Result<u64> {
        match &self.db_path {
            Some(path) => Ok(std::fs::metadata(path)?.len()),
            None => Ok(0),
        }
    }

    // === Doctor checks ===

    pub fn check_negative_balances(&self) -> Result<Vec<AccountId>> {
        self.ids("SELECT account_id FROM accounts WHERE balance < 0 ORDER BY account_id")
            .map(|ids| ids.into_iter().map(AccountId).collect())
    }

    pub fn check_self_transfers(&self) -> Result<Vec<TransactionId>> {
        self.transaction_ids("from_account_id = to_account_id")
    }

    pub fn check_non_terminal_transactions(&self) -> Result<Vec<TransactionId>> {
        self.transaction_ids("status NOT IN ('completed', 'failed')")
    }

    /// Non-positive amounts, and failed rows without a reason or completed rows with one
    pub fn check_invalid_amounts(&self) -> Result<Vec<TransactionId>> {
        self.transaction_ids(
            "amount <= 0
             OR (status = 'failed' AND failure_reason IS NULL)
             OR (status = 'completed' AND failure_reason IS NOT NULL)",
        )
    }

    pub fn check_orphaned_transactions(&self) -> Result<Vec<TransactionId>> {
        self.ids(
            "SELECT t.transaction_id FROM transactions t
             LEFT JOIN accounts f ON t.from_account_id = f.account_id
             LEFT JOIN accounts d ON t.to_account_id = d.account_id
             WHERE f.account_id IS NULL OR d.account_id IS NULL
             ORDER BY t.transaction_id",
        )
        .map(|ids| ids.into_iter().map(TransactionId).collect())
    }

    fn transaction_ids(&self, condition: &str) -> Result<Vec<TransactionId>> {
        self.ids(&format!(
            "SELECT transaction_id FROM transactions WHERE {} ORDER BY transaction_id",
            condition
        ))
        .map(|ids| ids.into_iter().map(TransactionId).collect())
    }

    fn ids(&self, sql: &str) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<duckdb::Result<_>>()?;
        Ok(ids)
    }

    /// Most recent transactions first
    pub fn recent_transactions(&self, limit: usize) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY transaction_id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![limit as i64], row_to_transaction)?
            .collect::<duckdb::Result<_>>()?;
        Ok(records)
    }
}

impl AccountStore for DuckDbRepository {
    fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.get_account_by_id(id)
    }

    fn begin(&self) -> Result<Box<dyn TransferUnit + '_>> {
        Ok(Box::new(DuckDbUnit {
            repo: self,
            held: HeldLocks::new(),
            balances: Vec::new(),
            appended: Vec::new(),
        }))
    }
}

impl TransactionLog for DuckDbRepository {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE transaction_id = ?",
            TRANSACTION_COLUMNS
        ))?;
        let mut rows = stmt.query(params![id.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_transaction(row)?)),
            None => Ok(None),
        }
    }

    fn transactions_for_account(&self, id: AccountId) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE from_account_id = ? OR to_account_id = ?
             ORDER BY transaction_id",
            TRANSACTION_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![id.get(), id.get()], row_to_transaction)?
            .collect::<duckdb::Result<_>>()?;
        Ok(records)
    }

    fn transaction_count(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM transactions")
    }
}

/// Unit of work over [`DuckDbRepository`]
///
/// Row locks are taken first and rows are read under them. Staged writes are
/// applied in one database transaction at commit.
struct DuckDbUnit<'a> {
    repo: &'a DuckDbRepository,
    held: HeldLocks<'a>,
    balances: Vec<(AccountId, Decimal)>,
    appended: Vec<TransactionRecord>,
}

impl TransferUnit for DuckDbUnit<'_> {
    fn lock_for_update(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.held.acquire(&self.repo.locks, id, self.repo.lock_timeout)?;
        self.repo.get_account_by_id(id)
    }

    fn update(&mut self, id: AccountId, new_balance: Decimal) -> Result<()> {
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
        record.validate().map_err(Error::validation)?;

        // Reserve the id now so the caller has it before commit
        let id = next_id(&*self.repo.conn()?, "seq_transactions")?;
        let mut record = record.clone();
        record.id = TransactionId(id);
        self.appended.push(record);
        Ok(TransactionId(id))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut conn = self.repo.conn()?;
        let tx = conn.transaction()?;
        let now = format_timestamp(Utc::now());

        for (id, balance) in &self.balances {
            let changed = tx.execute(
                "UPDATE accounts
                 SET balance = CAST(? AS DECIMAL(18,2)), updated_at = CAST(? AS TIMESTAMP)
                 WHERE account_id = ?",
                params![balance.to_string(), now, id.get()],
            )?;
            if changed != 1 {
                // Dropping `tx` rolls back
                return Err(Error::not_found(format!("account {}", id)));
            }
        }

        for record in &self.appended {
            let failure_code = record.failure_reason.as_ref().map(|r| r.code());
            let failure_reason = record
                .failure_reason
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                "INSERT INTO transactions (transaction_id, from_account_id, to_account_id, amount,
                                           currency, transaction_type, status, failure_code,
                                           failure_reason, timestamp, created_at, updated_at)
                 VALUES (?, ?, ?, CAST(? AS DECIMAL(18,2)), ?, ?, ?, ?, ?,
                         CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
                params![
                    record.id.get(),
                    record.from_account_id.get(),
                    record.to_account_id.get(),
                    record.amount.to_string(),
                    record.currency,
                    record.transaction_type.as_str(),
                    record.status.as_str(),
                    failure_code,
                    failure_reason,
                    format_timestamp(record.timestamp),
                    format_timestamp(record.created_at),
                    format_timestamp(record.updated_at),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// Draw the next value of a sequence
fn next_id(conn: &Connection, sequence: &str) -> Result<i64> {
    let id = conn.query_row(&format!("SELECT nextval('{}')", sequence), [], |row| {
        row.get(0)
    })?;
    Ok(id)
}

// === Row mapping ===

fn row_to_account(row: &duckdb::Row<'_>) -> duckdb::Result<Account> {
    Ok(Account {
        id: AccountId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        bank_id: BankId(row.get(2)?),
        account_type: parse_column(row, 3, FromStr::from_str)?,
        status: parse_column(row, 4, FromStr::from_str)?,
        currency: row.get(5)?,
        balance: parse_column(row, 6, parse_decimal)?,
        is_deleted: row.get(7)?,
        deleted_at: parse_optional_column(row, 8, parse_timestamp)?,
        created_at: parse_column(row, 9, parse_timestamp)?,
        updated_at: parse_column(row, 10, parse_timestamp)?,
    })
}

fn row_to_transaction(row: &duckdb::Row<'_>) -> duckdb::Result<TransactionRecord> {
    Ok(TransactionRecord {
        id: TransactionId(row.get(0)?),
        from_account_id: AccountId(row.get(1)?),
        to_account_id: AccountId(row.get(2)?),
        amount: parse_column(row, 3, parse_decimal)?,
        currency: row.get(4)?,
        transaction_type: parse_column(row, 5, FromStr::from_str)?,
        status: parse_column(row, 6, FromStr::from_str)?,
        failure_reason: parse_optional_column(row, 7, |s| {
            serde_json::from_str::<FailureReason>(s)
        })?,
        timestamp: parse_column(row, 8, parse_timestamp)?,
        created_at: parse_column(row, 9, parse_timestamp)?,
        updated_at: parse_column(row, 10, parse_timestamp)?,
    })
}

/// Read a text column and parse it, reporting failures as conversion errors
fn parse_column<T, E>(
    row: &duckdb::Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> duckdb::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    parse(&text).map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_column<T, E>(
    row: &duckdb::Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> duckdb::Result<Option<T>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|s| {
        parse(&s).map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn parse_decimal(s: &str) -> std::result::Result<Decimal, rust_decimal::Error> {
    Decimal::from_str_exact(s.trim())
}

/// DuckDB renders TIMESTAMP as text without a zone; values are stored in UTC
fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
