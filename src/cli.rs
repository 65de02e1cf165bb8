//! Command-line interface parsing for fetchcache
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated `RunConfig` for the binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::bridge::SnapshotBridge;
use crate::config::CacheConfig;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The expiration window must be at least one second
    #[error("Invalid TTL: '{0}'. The expiration window must be at least 1 second")]
    InvalidTtl(u64),

    /// Keys must be non-empty
    #[error("Invalid key: keys must not be empty")]
    EmptyKey,

    /// `--save` was requested but no cache directory is known
    #[error("No default snapshot location: could not determine a home directory")]
    NoDefaultSnapshotPath,
}

/// fetchcache - Fetch JSON through a time-bounded in-process cache
#[derive(Parser, Debug)]
#[command(name = "fetchcache")]
#[command(about = "Fetch JSON URLs through a time-bounded cache with snapshot handoff")]
#[command(version)]
pub struct Cli {
    /// URLs to resolve; each prints its final state as JSON
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// URLs to warm before resolving; failures are only logged
    #[arg(long, value_name = "URL")]
    pub preload: Vec<String>,

    /// Snapshot file to merge into the cache before anything else
    #[arg(long, value_name = "FILE")]
    pub import: Option<PathBuf>,

    /// Snapshot file to write after all URLs are resolved
    #[arg(long, value_name = "FILE", conflicts_with = "save")]
    pub export: Option<PathBuf>,

    /// Write the snapshot to the default cache directory
    #[arg(long)]
    pub save: bool,

    /// Expiration window in seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub ttl: u64,

    /// Log cache activity at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated settings for one run of the binary
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Keys to resolve in order
    pub urls: Vec<String>,
    /// Keys to warm first
    pub preload: Vec<String>,
    /// Snapshot to import
    pub import: Option<PathBuf>,
    /// Snapshot to export
    pub export: Option<PathBuf>,
    /// Cache settings
    pub cache: CacheConfig,
    /// Debug logging requested
    pub verbose: bool,
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(RunConfig)` with validated settings
    /// * `Err(CliError)` if the TTL is zero, a key is empty, or `--save` has nowhere to write
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.ttl == 0 {
            return Err(CliError::InvalidTtl(cli.ttl));
        }
        if cli.urls.iter().chain(&cli.preload).any(|key| key.trim().is_empty()) {
            return Err(CliError::EmptyKey);
        }

        let export = match (&cli.export, cli.save) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(
                SnapshotBridge::default_path().ok_or(CliError::NoDefaultSnapshotPath)?,
            ),
            (None, false) => None,
        };

        Ok(RunConfig {
            urls: cli.urls.clone(),
            preload: cli.preload.clone(),
            import: cli.import.clone(),
            export,
            cache: CacheConfig::default().with_expiration(Duration::from_secs(cli.ttl)),
            verbose: cli.verbose,
        })
    }
}
