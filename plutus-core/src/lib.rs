//! Plutus Core - Concurrent money transfers between bank accounts
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, TransactionRecord, etc.)
//! - **ports**: Trait definitions for stores (AccountStore, TransactionLog)
//! - **services**: Business logic orchestration (transfer engine, seeding, simulation)
//! - **adapters**: Concrete implementations (DuckDB, in-memory, data generator)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Account, AccountId, AccountStatus, Bank, BankId, FailureReason, TransactionId,
    TransactionRecord, TransactionStatus, TransferRequest, User, UserId,
};
pub use domain::result::Error;
pub use services::{LogEvent, LoggingService};

/// Main context for Plutus operations
///
/// Holds the configuration, the DuckDB-backed store and the services built
/// on it.
pub struct PlutusContext {
    pub config: Config,
    pub plutus_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub transfer_service: TransferService,
    pub seed_service: SeedService,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
}

impl PlutusContext {
    /// Open the database in `plutus_dir`, creating it and the directory if needed
    pub fn new(plutus_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(plutus_dir)?;
        let config = Config::load(plutus_dir)?;

        let db_path = config.database_path(plutus_dir);
        let repository = Arc::new(DuckDbRepository::new(&db_path, config.lock_timeout())?);

        // Initialize schema
        repository.ensure_schema()?;

        let transfer_service = TransferService::new(repository.clone());
        let seed_service = SeedService::new(Arc::clone(&repository), &config.currency);
        let status_service = StatusService::new(Arc::clone(&repository));
        let doctor_service = DoctorService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            plutus_dir: plutus_dir.to_path_buf(),
            repository,
            transfer_service,
            seed_service,
            status_service,
            doctor_service,
        })
    }

    /// Simulation over every account currently in the database
    pub fn simulation_service(&self) -> Result<SimulationService> {
        let accounts = self
            .repository
            .get_accounts()?
            .into_iter()
            .map(|account| account.id)
            .collect();
        Ok(SimulationService::new(self.repository.clone(), accounts))
    }
}
