//! fetchcache
//!
//! A process-local, time-bounded cache in front of a remote JSON fetch. Values
//! are kept for a fixed expiration window (60 seconds by default), repeated and
//! concurrent requests for the same key reuse one fetch, and the whole cache can
//! be exported to JSON text and imported elsewhere.
//!
//! The pieces, from the bottom up:
//! - [`CacheStore`]: keyed entries with storage timestamps
//! - [`FetchCoordinator`]: cache-or-fetch resolution and preloading
//! - [`FetchBinding`]: observable `{ is_loading, data, error }` state per key
//! - [`SnapshotBridge`]: snapshot export/import as text or files

pub mod binding;
pub mod bridge;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;

pub use binding::{FetchBinding, FetchState};
pub use bridge::SnapshotBridge;
pub use cache::{CacheEntry, CacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, EXPIRATION_WINDOW};
pub use error::{FetchError, SnapshotError};
pub use fetch::{FetchCoordinator, FetchOutcome, Fetcher, HttpFetcher};
