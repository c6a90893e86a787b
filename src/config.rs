//! Configuration for the storage manager.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Defaults matching the embedded deployment (5 s flush, batches of 100)

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::cache::CacheConfig;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "main.db";

/// Embedded SQLite row storage with a write-behind cache.
#[derive(Parser, Debug, Clone)]
#[command(name = "storage-manager")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base directory for the database file
    #[arg(short, long, env = "STORAGE_MANAGER_DATA_DIR", default_value = "config/storagemanager")]
    pub data_dir: PathBuf,

    /// Interval between background flushes, in milliseconds
    #[arg(long, env = "STORAGE_MANAGER_FLUSH_INTERVAL_MS", default_value_t = 5000)]
    pub flush_interval_ms: u64,

    /// Pending operations per table that force a synchronous flush
    #[arg(long, env = "STORAGE_MANAGER_BATCH_SIZE", default_value_t = 100)]
    pub batch_size: usize,

    /// How long shutdown waits for the flush thread, in milliseconds
    #[arg(long, env = "STORAGE_MANAGER_SHUTDOWN_TIMEOUT_MS", default_value_t = 5000)]
    pub shutdown_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::from_config(self.batch_size, self.flush_interval_ms, self.shutdown_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("config/storagemanager"),
            flush_interval_ms: 5000,
            batch_size: 100,
            shutdown_timeout_ms: 5000,
            log_level: "info".into(),
        }
    }
}
