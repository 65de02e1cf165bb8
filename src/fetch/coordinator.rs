//! Cache-or-fetch resolution for request keys
//!
//! The coordinator answers a key from the store while the entry is fresh and
//! otherwise runs the underlying fetch, storing the result on success. Misses
//! for the same key that overlap in time share one fetch.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use super::Fetcher;
use crate::cache::{mutex_lock, CacheStore};
use crate::config::CacheConfig;
use crate::error::FetchError;

/// Result of resolving a key: the value, or why it could not be fetched
pub type FetchOutcome = Result<Value, FetchError>;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

type InFlight = Arc<Mutex<HashMap<String, SharedFetch>>>;

/// Removes its key from the in-flight map when dropped
///
/// Dropped on completion and on unwind alike, so a key never stays pinned to a
/// finished or poisoned fetch.
struct InFlightGuard {
    key: String,
    in_flight: InFlight,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        mutex_lock(&self.in_flight, "in_flight").remove(&self.key);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Decides between cached values and fresh fetches for each key
pub struct FetchCoordinator {
    store: Arc<CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    config: CacheConfig,
    /// Fetches currently running, keyed by request key
    in_flight: InFlight,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FetchCoordinator {
    /// Creates a coordinator with the default 60 second expiration window
    pub fn new(store: Arc<CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_config(store, fetcher, CacheConfig::default())
    }

    /// Creates a coordinator with a custom configuration
    pub fn with_config(
        store: Arc<CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The store this coordinator reads and writes
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// The active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached value for `key` if it is still inside the expiration window
    ///
    /// Never fetches and never blocks on a running fetch.
    pub fn cached(&self, key: &str) -> Option<Value> {
        let entry = self.store.get(key)?;
        entry
            .is_fresh(self.store.now(), self.config.expiration)
            .then_some(entry.data)
    }

    /// Resolves `key` to a value
    ///
    /// # Behavior
    /// - A fresh cache entry is returned without fetching
    /// - Otherwise the fetcher is called and a successful value is stored
    /// - A failed fetch leaves the store untouched, so the next call retries
    /// - Concurrent misses for the same key wait on the same fetch
    pub async fn resolve(&self, key: &str) -> FetchOutcome {
        if let Some(value) = self.cached(key) {
            debug!(key = %key, "Cache hit");
            return Ok(value);
        }

        self.fetch_shared(key).await
    }

    /// Warms the cache for `key` without reporting the outcome
    ///
    /// A fresh entry short-circuits the fetch, as in [`resolve`](Self::resolve).
    /// Failures are logged and swallowed.
    pub async fn preload(&self, key: &str) {
        if self.cached(key).is_some() {
            debug!(key = %key, "Preload skipped, entry is fresh");
            return;
        }

        if let Err(err) = self.fetch_shared(key).await {
            error!(key = %key, error = %err, "Error preloading data");
        }
    }

    /// Warms the cache for several keys concurrently
    pub async fn preload_all<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let preloads = keys.iter().map(|key| self.preload(key.as_ref()));
        futures::future::join_all(preloads).await;
    }

    /// Joins the running fetch for `key`, or starts one
    fn fetch_shared(&self, key: &str) -> SharedFetch {
        let mut in_flight = mutex_lock(&self.in_flight, "in_flight");

        if let Some(running) = in_flight.get(key) {
            debug!(key = %key, "Joining in-flight fetch");
            return running.clone();
        }

        // A fetch may have finished between the caller's lookup and taking the
        // lock. Finished fetches store before leaving `in_flight`.
        if let Some(value) = self.cached(key) {
            return futures::future::ready(Ok(value)).boxed().shared();
        }

        let fetch = Self::fetch_and_store(
            key.to_string(),
            self.fetcher.clone(),
            self.store.clone(),
            self.in_flight.clone(),
        )
        .boxed()
        .shared();
        in_flight.insert(key.to_string(), fetch.clone());
        fetch
    }

    async fn fetch_and_store(
        key: String,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<CacheStore>,
        in_flight: InFlight,
    ) -> FetchOutcome {
        // Declared first so it drops last: the store is written before the key
        // leaves `in_flight`.
        let _guard = InFlightGuard {
            key: key.clone(),
            in_flight,
        };

        debug!(key = %key, "Cache miss, fetching");
        let outcome = match AssertUnwindSafe(fetcher.fetch(&key)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(key = %key, panic = %message, "Fetcher panicked");
                Err(FetchError::transport(format!("fetcher panicked: {}", message)))
            }
        };

        match &outcome {
            Ok(value) => store.put(key.clone(), value.clone()),
            Err(err) => warn!(key = %key, error = %err, "Fetch failed"),
        }

        outcome
    }
}
