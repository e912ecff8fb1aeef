//! CLI command implementations

pub mod account;
pub mod config;
pub mod doctor;
pub mod logs;
pub mod seed;
pub mod simulate;
pub mod status;
pub mod transfer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use plutus_core::{LogEvent, LoggingService, PlutusContext};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let plutus_dir = get_plutus_dir().ok()?;
    std::fs::create_dir_all(&plutus_dir).ok()?;
    LoggingService::new(&plutus_dir, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!(error = %e, "event log write failed");
        }
    }
}

/// Get the plutus directory from environment or default
pub fn get_plutus_dir() -> Result<PathBuf> {
    Ok(plutus_core::config::plutus_dir()?)
}

/// Open the database and build the services
pub fn get_context() -> Result<PlutusContext> {
    let plutus_dir = get_plutus_dir()?;
    PlutusContext::new(&plutus_dir)
        .with_context(|| format!("Failed to open plutus database in {}", plutus_dir.display()))
}
