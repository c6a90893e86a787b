//! storagectl: Command-line interface for the storage manager.
//!
//! Opens the store as an authoritative host, runs one command and shuts the
//! manager down again, so deferred writes are flushed before exit.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use storage_manager::observability::tracing::init_tracing;
use storage_manager::{Config, HostRole, StorageManager};

/// Command-line interface for the storage manager.
#[derive(Parser)]
#[command(name = "storagectl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a table if it does not exist
    Register {
        /// Table name
        table: String,
        /// Column as name:type[:not-null], e.g. id:integer:not-null
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,
        /// Primary key column (repeat for a composite key)
        #[arg(short, long = "primary-key")]
        primary_keys: Vec<String>,
    },
    /// Insert or replace a row given as a JSON object
    Insert {
        /// Table name
        table: String,
        /// Row, e.g. '{"id": 1, "name": "steve"}'
        row: String,
        /// Commit before returning instead of staging in the cache
        #[arg(long)]
        immediate: bool,
    },
    /// Print rows matching a JSON predicate (all rows if omitted)
    Select {
        /// Table name
        table: String,
        /// Equality predicate, e.g. '{"id": 1}'
        predicate: Option<String>,
    },
    /// Delete rows matching a non-empty JSON predicate
    Delete {
        /// Table name
        table: String,
        /// Equality predicate, e.g. '{"id": 1}'
        predicate: String,
        /// Commit before returning instead of staging in the cache
        #[arg(long)]
        immediate: bool,
    },
    /// Flush staged writes for one table, or all tables
    Flush {
        /// Table name (all tables if omitted)
        table: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("storagectl", &cli.config.log_level);

    let manager = StorageManager::initialize(&cli.config, HostRole::Authoritative)
        .context("failed to open store")?;
    manager.mark_ready();

    let result = run(&manager, cli.command, cli.output);
    let shutdown = manager.shutdown().context("failed to flush staged writes");

    result.and(shutdown)
}

fn run(manager: &StorageManager, command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Register {
            table,
            columns,
            primary_keys,
        } => commands::table::register(manager, &table, &columns, primary_keys, format),
        Commands::Insert {
            table,
            row,
            immediate,
        } => commands::rows::insert(manager, &table, &row, immediate, format),
        Commands::Select { table, predicate } => {
            commands::rows::select(manager, &table, predicate.as_deref(), format)
        }
        Commands::Delete {
            table,
            predicate,
            immediate,
        } => commands::rows::delete(manager, &table, &predicate, immediate, format),
        Commands::Flush { table } => commands::table::flush(manager, table.as_deref(), format),
    }
}
