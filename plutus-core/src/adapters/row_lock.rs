//! Keyed row lock table
//!
//! Gives each account id its own exclusive lock without allocating a mutex
//! per account. One table belongs to one store instance, so every engine
//! sharing that store also shares the locks.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::result::{Error, Result};
use crate::domain::AccountId;

/// Exclusive per-account locks with bounded waiting
#[derive(Debug, Default)]
pub struct RowLocks {
    held: Mutex<HashSet<AccountId>>,
    released: Condvar,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `id` is free, then take it
    ///
    /// Gives up with `Error::LockTimeout` once `timeout` has elapsed. The
    /// returned guard releases the lock when dropped.
    pub fn acquire(&self, id: AccountId, timeout: Duration) -> Result<RowLockGuard<'_>> {
        let deadline = Instant::now() + timeout;
        let mut held = self
            .held
            .lock()
            .map_err(|_| Error::unavailable("row lock table poisoned"))?;

        while held.contains(&id) {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::LockTimeout(id));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| Error::unavailable("row lock table poisoned"))?;
            held = guard;
        }

        held.insert(id);
        Ok(RowLockGuard { locks: self, id })
    }

    /// True if some unit currently holds `id`
    pub fn is_locked(&self, id: AccountId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    fn release(&self, id: AccountId) {
        // A poisoned table must still release the row
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&id);
        drop(held);
        self.released.notify_all();
    }
}

/// RAII guard for one row lock
#[derive(Debug)]
pub struct RowLockGuard<'a> {
    locks: &'a RowLocks,
    id: AccountId,
}

impl RowLockGuard<'_> {
    pub fn id(&self) -> AccountId {
        self.id
    }
}

impl Drop for RowLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(self.id);
    }
}

/// Row locks held by one unit of work, enforcing ascending acquisition order
#[derive(Debug, Default)]
pub struct HeldLocks<'a> {
    guards: Vec<RowLockGuard<'a>>,
}

impl<'a> HeldLocks<'a> {
    pub fn new() -> Self {
        Self { guards: Vec::new() }
    }

    /// Acquire `id` after checking it sorts above every lock already held
    pub fn acquire(&mut self, locks: &'a RowLocks, id: AccountId, timeout: Duration) -> Result<()> {
        if let Some(last) = self.guards.last() {
            if id <= last.id() {
                return Err(Error::LockOrder(format!(
                    "account {} requested while holding account {}",
                    id,
                    last.id()
                )));
            }
        }
        let guard = locks.acquire(id, timeout)?;
        self.guards.push(guard);
        Ok(())
    }

    pub fn holds(&self, id: AccountId) -> bool {
        self.guards.iter().any(|g| g.id() == id)
    }

    /// Check that `id` is held, for write paths
    pub fn ensure_held(&self, id: AccountId) -> Result<()> {
        if self.holds(id) {
            Ok(())
        } else {
            Err(Error::LockOrder(format!(
                "account {} written without holding its lock",
                id
            )))
        }
    }
}
