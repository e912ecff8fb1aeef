//! Configuration management
//!
//! Settings live in `settings.json` inside the plutus directory:
//! ```json
//! {
//!   "databaseFile": "plutus.duckdb",
//!   "lockTimeoutMs": 5000,
//!   "currency": "EUR",
//!   "simulation": { "workers": 4, "count": 1000 }
//! }
//! ```
//! Every key is optional. Keys this crate does not manage are preserved on
//! save. Environment variables override the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

pub const DEFAULT_DATABASE_FILE: &str = "plutus.duckdb";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_SIMULATION_WORKERS: usize = 4;
pub const DEFAULT_SIMULATION_COUNT: usize = 1_000;

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
    #[serde(default)]
    simulation: SimulationSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_file: String,
    pub lock_timeout_ms: u64,
    pub currency: String,
    pub simulation_workers: usize,
    pub simulation_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            currency: DEFAULT_CURRENCY.to_string(),
            simulation_workers: DEFAULT_SIMULATION_WORKERS,
            simulation_count: DEFAULT_SIMULATION_COUNT,
        }
    }
}

/// Plutus directory: `PLUTUS_DIR`, else `~/.plutus`
pub fn plutus_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PLUTUS_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".plutus"))
        .ok_or_else(|| Error::Config("could not find home directory; set PLUTUS_DIR".to_string()))
}

impl Config {
    /// Load config from the plutus directory
    ///
    /// A missing settings file means defaults. `PLUTUS_DATABASE_FILE` and
    /// `PLUTUS_LOCK_TIMEOUT_MS` override the file.
    pub fn load(plutus_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(plutus_dir)?;

        if let Ok(file) = std::env::var("PLUTUS_DATABASE_FILE") {
            config.database_file = file;
        }
        if let Ok(ms) = std::env::var("PLUTUS_LOCK_TIMEOUT_MS") {
            config.lock_timeout_ms = ms.trim().parse().map_err(|_| {
                Error::Config(format!("PLUTUS_LOCK_TIMEOUT_MS must be an integer, got '{}'", ms))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only what settings.json says, ignoring environment overrides
    ///
    /// Use this when the result will be saved back.
    pub fn load_file(plutus_dir: &Path) -> Result<Self> {
        let raw = read_settings(plutus_dir)?;
        let defaults = Config::default();

        let config = Self {
            database_file: raw.database_file.unwrap_or(defaults.database_file),
            lock_timeout_ms: raw.lock_timeout_ms.unwrap_or(defaults.lock_timeout_ms),
            currency: raw.currency.unwrap_or(defaults.currency),
            simulation_workers: raw.simulation.workers.unwrap_or(defaults.simulation_workers),
            simulation_count: raw.simulation.count.unwrap_or(defaults.simulation_count),
        };
        config.validate()?;
        Ok(config)
    }

    /// Settings keys accepted by [`Config::set`], in settings.json spelling
    pub const KEYS: [&'static str; 5] = [
        "databaseFile",
        "lockTimeoutMs",
        "currency",
        "simulation.workers",
        "simulation.count",
    ];

    /// Current value of a settings key
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "databaseFile" => Ok(self.database_file.clone()),
            "lockTimeoutMs" => Ok(self.lock_timeout_ms.to_string()),
            "currency" => Ok(self.currency.clone()),
            "simulation.workers" => Ok(self.simulation_workers.to_string()),
            "simulation.count" => Ok(self.simulation_count.to_string()),
            _ => Err(unknown_key(key)),
        }
    }

    /// Change one settings key, validating the result
    ///
    /// Nothing is changed if the value does not parse or is out of range.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        let value = value.trim();
        match key {
            "databaseFile" => updated.database_file = value.to_string(),
            "lockTimeoutMs" => updated.lock_timeout_ms = parse_number(key, value)?,
            "currency" => updated.currency = value.to_uppercase(),
            "simulation.workers" => updated.simulation_workers = parse_number(key, value)?,
            "simulation.count" => updated.simulation_count = parse_number(key, value)?,
            _ => return Err(unknown_key(key)),
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Save config to the plutus directory, keeping keys it does not manage
    pub fn save(&self, plutus_dir: &Path) -> Result<()> {
        let mut settings = read_settings(plutus_dir)?;

        settings.database_file = Some(self.database_file.clone());
        settings.lock_timeout_ms = Some(self.lock_timeout_ms);
        settings.currency = Some(self.currency.clone());
        settings.simulation.workers = Some(self.simulation_workers);
        settings.simulation.count = Some(self.simulation_count);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(plutus_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(Error::Config("databaseFile cannot be empty".to_string()));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::Config("lockTimeoutMs must be positive".to_string()));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(Error::Config(format!(
                "currency must be a three-letter uppercase code, got '{}'",
                self.currency
            )));
        }
        if self.simulation_workers == 0 {
            return Err(Error::Config("simulation.workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn database_path(&self, plutus_dir: &Path) -> PathBuf {
        plutus_dir.join(&self.database_file)
    }
}

fn unknown_key(key: &str) -> Error {
    Error::Config(format!(
        "unknown setting '{}', expected one of: {}",
        key,
        Config::KEYS.join(", ")
    ))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn read_settings(plutus_dir: &Path) -> Result<SettingsFile> {
    let settings_path = plutus_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("invalid {}: {}", settings_path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Tests that set PLUTUS_* variables would race with these; none do.

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.database_file, "plutus.duckdb");
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.simulation_workers, 4);
        assert_eq!(config.simulation_count, 1000);
    }

    #[test]
    fn test_reads_camel_case_settings() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"databaseFile": "bank.duckdb", "lockTimeoutMs": 250,
                "simulation": {"workers": 8}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.database_path(dir.path()), dir.path().join("bank.duckdb"));
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.simulation_workers, 8);
        assert_eq!(config.simulation_count, 1000);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), r#"{"lockTimeoutMs": 0}"#).unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));

        std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_preserves_unmanaged_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"theme": "dark", "simulation": {"seed": 7}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.simulation_count = 50;
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap())
                .unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["simulation"]["seed"], 7);
        assert_eq!(raw["simulation"]["count"], 50);
        assert_eq!(raw["lockTimeoutMs"], 5000);
    }

    #[test]
    fn test_set_validates_and_round_trips_through_save() {
        let dir = tempdir().unwrap();
        let mut config = Config::load_file(dir.path()).unwrap();

        config.set("currency", "usd").unwrap();
        config.set("simulation.workers", "2").unwrap();
        config.save(dir.path()).unwrap();

        let reloaded = Config::load(dir.path()).unwrap();
        assert_eq!(reloaded.currency, "USD");
        assert_eq!(reloaded.get("simulation.workers").unwrap(), "2");

        // Rejected values leave the config untouched
        assert!(matches!(config.set("lockTimeoutMs", "0"), Err(Error::Config(_))));
        assert!(matches!(config.set("lockTimeoutMs", "soon"), Err(Error::Config(_))));
        assert!(matches!(config.set("currency", "EURO"), Err(Error::Config(_))));
        assert!(matches!(config.set("theme", "dark"), Err(Error::Config(_))));
        assert_eq!(config.lock_timeout_ms, 5000);
        assert_eq!(config.currency, "USD");
    }
}
