//! Cache configuration

use std::time::Duration;

/// How long a stored entry satisfies lookups before it is re-fetched
pub const EXPIRATION_WINDOW: Duration = Duration::from_secs(60);

/// Configuration for a fetch coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Age after which a cached entry is considered stale
    pub expiration: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration: EXPIRATION_WINDOW,
        }
    }
}

impl CacheConfig {
    /// Returns a copy of this configuration with a different expiration window
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }
}
