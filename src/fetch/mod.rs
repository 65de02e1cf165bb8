//! Fetching values on cache misses
//!
//! This module contains the [`Fetcher`] seam used for the underlying remote
//! request, an HTTP implementation of it, and the [`FetchCoordinator`] which
//! decides between the cache and the fetcher for each key.

mod coordinator;
mod http;

pub use coordinator::{FetchCoordinator, FetchOutcome};
pub use http::HttpFetcher;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// The underlying fetch performed when a key is missing or stale
///
/// The key doubles as the fetch target, typically a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the JSON value for `key`
    async fn fetch(&self, key: &str) -> Result<Value, FetchError>;
}
