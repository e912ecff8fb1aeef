//! Simulation service - random concurrent transfer load
//!
//! Worker threads share one transfer engine and fire transfers between
//! random account pairs. The summary reports outcomes and the total balance
//! before and after, which must match.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use serde::Serialize;

use super::TransferService;
use crate::adapters::generator::generate_amount;
use crate::domain::AccountId;
use crate::ports::AccountStore;

/// Outcome tally of one simulation run
#[derive(Debug, Default, Clone, Serialize)]
pub struct SimulationSummary {
    pub requested: usize,
    pub completed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Failed transfers by failure code
    pub failures: BTreeMap<String, usize>,
    /// Aborted transfers by error code
    pub errors: BTreeMap<String, usize>,
    pub total_before: Decimal,
    pub total_after: Decimal,
    pub elapsed_ms: u128,
}

impl SimulationSummary {
    /// Money was neither created nor destroyed
    pub fn is_conserved(&self) -> bool {
        self.total_before == self.total_after
    }

    fn merge(&mut self, other: SimulationSummary) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.errored += other.errored;
        for (code, n) in other.failures {
            *self.failures.entry(code).or_default() += n;
        }
        for (code, n) in other.errors {
            *self.errors.entry(code).or_default() += n;
        }
    }
}

/// Add a worker's tally to the shared one
///
/// A poisoned lock still holds every tally merged before the panic.
fn merge_into(merged: &Mutex<SimulationSummary>, local: SimulationSummary) {
    merged
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .merge(local);
}

/// Service for running random transfer load against a store
pub struct SimulationService {
    store: Arc<dyn AccountStore>,
    engine: TransferService,
    accounts: Vec<AccountId>,
}

impl SimulationService {
    /// Simulate over the given accounts of `store`
    pub fn new(store: Arc<dyn AccountStore>, accounts: Vec<AccountId>) -> Self {
        let engine = TransferService::new(Arc::clone(&store));
        Self {
            store,
            engine,
            accounts,
        }
    }

    pub fn run(&self, count: usize, workers: usize) -> Result<SimulationSummary> {
        self.run_with_progress(count, workers, |_| {})
    }

    /// Run `count` transfers spread over `workers` threads
    ///
    /// `on_progress` is called from the worker threads after every transfer
    /// with the number finished so far.
    pub fn run_with_progress<F>(&self, count: usize, workers: usize, on_progress: F) -> Result<SimulationSummary>
    where
        F: Fn(usize) + Sync,
    {
        if self.accounts.len() < 2 {
            bail!("Simulation needs at least two accounts");
        }
        let workers = workers.max(1);

        let started = Instant::now();
        let total_before = self.total_balance()?;

        let next = AtomicUsize::new(0);
        let finished = AtomicUsize::new(0);
        let merged = Mutex::new(SimulationSummary::default());

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    let mut rng = rand::thread_rng();
                    let mut local = SimulationSummary::default();

                    while next.fetch_add(1, Ordering::SeqCst) < count {
                        let mut pair = self.accounts.choose_multiple(&mut rng, 2);
                        let (Some(&from), Some(&to)) = (pair.next(), pair.next()) else {
                            break;
                        };

                        match self.engine.execute(from, to, generate_amount(&mut rng)) {
                            Ok(record) if record.is_completed() => local.completed += 1,
                            Ok(record) => {
                                local.failed += 1;
                                let code = record
                                    .failure_reason
                                    .as_ref()
                                    .map(|r| r.code())
                                    .unwrap_or("unknown");
                                *local.failures.entry(code.to_string()).or_default() += 1;
                            }
                            Err(e) => {
                                local.errored += 1;
                                *local.errors.entry(e.code().to_string()).or_default() += 1;
                            }
                        }

                        on_progress(finished.fetch_add(1, Ordering::SeqCst) + 1);
                    }

                    merge_into(&merged, local);
                });
            }
        });

        let mut summary = merged.into_inner().unwrap_or_else(PoisonError::into_inner);
        summary.requested = count;
        summary.total_before = total_before;
        summary.total_after = self.total_balance()?;
        summary.elapsed_ms = started.elapsed().as_millis();

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            errored = summary.errored,
            conserved = summary.is_conserved(),
            "simulation finished"
        );
        Ok(summary)
    }

    fn total_balance(&self) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for id in &self.accounts {
            if let Some(account) = self.store.get(*id)? {
                total += account.balance;
            }
        }
        Ok(total)
    }
}
