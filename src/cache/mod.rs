//! In-memory cache store for fetched JSON values
//!
//! This module provides the keyed store that sits in front of the fetcher. Each
//! entry remembers when it was stored so the coordinator can decide whether it
//! is still fresh. The whole store can be snapshotted to JSON text and merged
//! back, which is how a warmed cache is handed from one process to another.

mod lock;
mod store;

pub(crate) use lock::mutex_lock;
pub use store::{CacheEntry, CacheStore};
