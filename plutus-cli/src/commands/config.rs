//! Config command - show or change settings.json

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{get_logger, get_plutus_dir, log_event};
use crate::output::{create_table, success};
use plutus_core::config::Config;
use plutus_core::LogEvent;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show effective settings, environment overrides included
    Show,
    /// Change a setting in settings.json
    Set {
        /// Setting key (databaseFile, lockTimeoutMs, currency, simulation.workers, simulation.count)
        key: String,
        /// New value
        value: String,
    },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let plutus_dir = get_plutus_dir()?;

    match command {
        ConfigCommands::Show => {
            let config = Config::load(&plutus_dir)?;

            let mut table = create_table();
            table.set_header(vec!["Key", "Value"]);
            for key in Config::KEYS {
                table.add_row(vec![key.to_string(), config.get(key)?]);
            }
            println!("{}", table);
        }
        ConfigCommands::Set { key, value } => {
            let logger = get_logger();
            log_event(&logger, LogEvent::new("command_executed").with_command("config set"));

            // Environment overrides must not end up in the file
            let mut config = Config::load_file(&plutus_dir)?;
            config.set(&key, &value)?;

            std::fs::create_dir_all(&plutus_dir)
                .with_context(|| format!("Failed to create {}", plutus_dir.display()))?;
            config.save(&plutus_dir)?;
            success(&format!("✓ {} = {}", key, config.get(&key)?));
        }
    }

    Ok(())
}
