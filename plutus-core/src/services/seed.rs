//! Seed service - fills the database with generated banks, users and accounts

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::adapters::generator::{generate_account, generate_bank, generate_user};

/// Service for populating a database with fake rows
pub struct SeedService {
    repository: Arc<DuckDbRepository>,
    currency: String,
}

/// Rows inserted by one seed run
#[derive(Debug, Default, Serialize)]
pub struct SeedResult {
    pub banks: usize,
    pub users: usize,
    pub accounts: usize,
}

impl SeedService {
    /// Banks and accounts are created in `currency`
    pub fn new(repository: Arc<DuckDbRepository>, currency: &str) -> Self {
        Self {
            repository,
            currency: currency.to_string(),
        }
    }

    /// Insert `banks` banks and `users` users, then `accounts` accounts each
    /// owned by a random user at a random bank
    ///
    /// Accounts may reference rows from earlier runs. Stops at the first
    /// failed insert.
    pub fn seed(&self, banks: usize, users: usize, accounts: usize) -> Result<SeedResult> {
        let mut rng = rand::thread_rng();
        let mut result = SeedResult::default();

        for _ in 0..banks {
            self.repository
                .insert_bank(&generate_bank(&mut rng, &self.currency))
                .context("Failed to insert bank")?;
            result.banks += 1;
        }

        for _ in 0..users {
            self.repository
                .insert_user(&generate_user(&mut rng))
                .context("Failed to insert user")?;
            result.users += 1;
        }

        for _ in 0..accounts {
            let (Some(bank_id), Some(user_id)) = (
                self.repository.random_bank_id()?,
                self.repository.random_user_id()?,
            ) else {
                bail!("Accounts need at least one bank and one user; seed those first");
            };
            self.repository
                .insert_account(&generate_account(&mut rng, user_id, bank_id, &self.currency))
                .context("Failed to insert account")?;
            result.accounts += 1;
        }

        tracing::info!(
            banks = result.banks,
            users = result.users,
            accounts = result.accounts,
            "seed finished"
        );
        Ok(result)
    }
}
