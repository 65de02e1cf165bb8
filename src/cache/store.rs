//! Keyed store of fetched values with their storage timestamps
//!
//! Provides a `CacheStore` that maps request keys to `CacheEntry` values behind a
//! single coarse lock, plus JSON snapshot export and all-or-nothing restore.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::lock::mutex_lock;
use crate::clock::{Clock, SystemClock};
use crate::error::SnapshotError;

/// A cached value together with the time it was stored
///
/// Serialized as `{ "data": <value>, "timestamp": <epoch-ms> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The fetched payload, opaque to the cache
    pub data: Value,
    /// When the payload was stored
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// How long ago this entry was stored, relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
    }

    /// Whether the entry is younger than `window` at `now`
    ///
    /// Entries stamped in the future (e.g. restored from a host with a skewed
    /// clock) count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        match Duration::from_std(window) {
            Ok(window) => self.age(now) < window,
            Err(_) => true,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "data": self.data,
            "timestamp": self.stored_at.timestamp_millis(),
        })
    }
}

/// Process-local store of cached fetch results
///
/// The store holds at most one entry per key. All operations take the same
/// lock, so a `restore` is never observed half-applied by a concurrent `get`.
/// Construct one per application instance and share it behind an `Arc`.
pub struct CacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    /// Creates an empty store stamped by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store using a custom clock
    ///
    /// Useful for testing expiry without waiting in real time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns a copy of the entry for `key`, if present
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        mutex_lock(&self.entries, "get").get(key).cloned()
    }

    /// Stores `data` under `key`, replacing any previous entry
    ///
    /// The entry is stamped with the current clock time.
    pub fn put(&self, key: impl Into<String>, data: Value) {
        let key = key.into();
        let entry = CacheEntry {
            data,
            stored_at: self.clock.now(),
        };
        debug!(key = %key, "Storing cache entry");
        mutex_lock(&self.entries, "put").insert(key, entry);
    }

    /// Removes every entry
    pub fn clear(&self) {
        let mut entries = mutex_lock(&self.entries, "clear");
        debug!(entries = entries.len(), "Clearing cache");
        entries.clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, "len").len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry exists for `key`, fresh or not
    pub fn contains_key(&self, key: &str) -> bool {
        mutex_lock(&self.entries, "contains_key").contains_key(key)
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = mutex_lock(&self.entries, "keys").keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Serializes the whole store to JSON text
    ///
    /// Keys are emitted in sorted order so equal stores produce equal text.
    pub fn snapshot(&self) -> String {
        let entries = mutex_lock(&self.entries, "snapshot");
        let object: Map<String, Value> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.to_json()))
            .collect();
        Value::Object(object).to_string()
    }

    /// Merges entries from snapshot text into the store
    ///
    /// Existing keys are overwritten and keys absent from the snapshot are kept.
    /// The text is parsed completely before the store is touched, so on error the
    /// store is left unchanged.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of entries merged
    /// * `Err(SnapshotError::Malformed)` if the text is not a valid snapshot
    pub fn restore(&self, text: &str) -> Result<usize, SnapshotError> {
        let parsed: HashMap<String, CacheEntry> = serde_json::from_str(text)?;
        let merged = parsed.len();

        mutex_lock(&self.entries, "restore").extend(parsed);
        info!(entries = merged, "Restored cache snapshot");

        Ok(merged)
    }
}
