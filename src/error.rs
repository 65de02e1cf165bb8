//! Error types shared across the cache, fetch and snapshot layers

use thiserror::Error;

/// Errors that can occur while fetching a value for a key
///
/// Both variants travel through the same failure channel of a fetch outcome.
/// The type is `Clone` so that a single failed fetch can be handed to every
/// caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request could not be completed (connection, I/O or body decode failure)
    #[error("{0}")]
    TransportFailure(String),

    /// The server answered with a non-success status code
    #[error("HTTP error! status: {status}")]
    UnsuccessfulResponse { status: u16 },
}

impl FetchError {
    /// Builds a transport failure from any displayable cause
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::TransportFailure(cause.to_string())
    }

    /// Returns the status code for unsuccessful responses
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnsuccessfulResponse { status } => Some(*status),
            Self::TransportFailure(_) => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err)
    }
}

/// Errors that can occur when importing or exporting a cache snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot text is not a JSON object of `{ data, timestamp }` entries
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Reading or writing a snapshot file failed
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
