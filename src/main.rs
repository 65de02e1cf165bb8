//! fetchcache - Fetch JSON URLs through a time-bounded cache
//!
//! Imports an optional snapshot, warms the requested URLs, resolves each URL
//! through a binding and prints its final state as one JSON line.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use fetchcache::cli::{Cli, RunConfig};
use fetchcache::{
    CacheStore, FetchBinding, FetchCoordinator, FetchState, HttpFetcher, SnapshotBridge,
};

/// One line of output per resolved URL
#[derive(Serialize)]
struct Report<'a> {
    url: &'a str,
    #[serde(flatten)]
    state: &'a FetchState,
}

/// Installs the stderr log subscriber; `RUST_LOG` overrides the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs the import, preload, resolve and export steps
///
/// Returns the number of URLs that ended in an error state.
async fn run(config: RunConfig) -> Result<usize, Box<dyn std::error::Error>> {
    let store = Arc::new(CacheStore::new());
    let bridge = SnapshotBridge::new(store.clone());

    if let Some(path) = &config.import {
        bridge.import_from_file(path)?;
    }

    let coordinator = Arc::new(FetchCoordinator::with_config(
        store,
        Arc::new(HttpFetcher::new()),
        config.cache.clone(),
    ));
    coordinator.preload_all(&config.preload).await;

    let mut failures = 0;
    let mut binding = FetchBinding::new(coordinator);
    for url in &config.urls {
        binding.observe(url.as_str());
        let state = binding.settled().await;
        if state.error.is_some() {
            failures += 1;
        }
        println!("{}", serde_json::to_string(&Report { url, state: &state })?);
    }

    if let Some(path) = &config.export {
        bridge.export_to_file(path)?;
    }

    Ok(failures)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match RunConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.verbose);

    match run(config).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
