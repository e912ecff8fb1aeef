//! Plutus CLI - Bank transfers in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, config, doctor, logs, seed, simulate, status, transfer};

/// Plutus - concurrent bank transfers backed by DuckDB
#[derive(Parser)]
#[command(name = "plutus", version, about, long_about = None)]
struct Cli {
    /// Show debug diagnostics on stderr (and check details for doctor)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bank, user, account and transaction summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Insert generated banks, users and accounts
    Seed {
        /// Number of banks to create
        #[arg(long, default_value = "5")]
        banks: usize,
        /// Number of users to create
        #[arg(long, default_value = "20")]
        users: usize,
        /// Number of accounts to create
        #[arg(long, default_value = "50")]
        accounts: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move money between two accounts
    Transfer {
        /// Source account ID
        from: i64,
        /// Destination account ID
        to: i64,
        /// Amount, at most two fractional digits
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transfer between two randomly picked accounts
    RandomTransfer {
        /// Amount (random between 10.00 and 1000.00 if omitted)
        #[arg(long)]
        amount: Option<Decimal>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run random concurrent transfers between existing accounts
    Simulate {
        /// Number of transfers (defaults to simulation.count in settings)
        #[arg(short, long)]
        count: Option<usize>,
        /// Worker threads (defaults to simulation.workers in settings)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change or remove accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// Run database integrity checks
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,plutus_core=debug,plutus=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Seed { banks, users, accounts, json } => seed::run(banks, users, accounts, json),
        Commands::Transfer { from, to, amount, json } => transfer::run(from, to, amount, json),
        Commands::RandomTransfer { amount, json } => transfer::run_random(amount, json),
        Commands::Simulate { count, workers, json } => simulate::run(count, workers, json),
        Commands::Account { command } => account::run(command),
        Commands::Config { command } => config::run(command),
        Commands::Doctor { json } => doctor::run(cli.verbose, json),
        Commands::Logs { command } => logs::run(command),
    }
}
