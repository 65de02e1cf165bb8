//! Observable fetch state for a single key
//!
//! A `FetchBinding` turns the coordinator into something a UI can watch: it
//! publishes `{ is_loading, data, error }` on a `tokio::sync::watch` channel and
//! re-runs whenever the observed key changes. Each key change bumps a
//! generation counter, and results tagged with an older generation are dropped,
//! so a slow response for a previous key never overwrites the current one.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::error::FetchError;
use crate::fetch::{FetchCoordinator, FetchOutcome};

/// State exposed to observers of a binding
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchState {
    /// A resolution is in flight
    pub is_loading: bool,
    /// Value of the last successful resolution
    pub data: Option<Value>,
    /// Cause of the last failed resolution
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<FetchError>,
}

fn serialize_error<S: Serializer>(
    error: &Option<FetchError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct ErrorBody {
        message: String,
    }

    match error {
        Some(err) => ErrorBody {
            message: err.to_string(),
        }
        .serialize(serializer),
        None => serializer.serialize_none(),
    }
}

impl FetchState {
    /// Nothing requested yet
    pub fn initial() -> Self {
        Self::default()
    }

    /// Waiting on a fetch
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    /// Resolved to a value
    pub fn success(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Resolution failed
    pub fn failure(error: FetchError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Terminal state matching a fetch outcome
    pub fn from_outcome(outcome: FetchOutcome) -> Self {
        match outcome {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(err),
        }
    }

    /// Whether this state is a completed resolution
    pub fn is_terminal(&self) -> bool {
        !self.is_loading && (self.data.is_some() || self.error.is_some())
    }
}

/// Observable resolution of the most recently requested key
///
/// Resolutions run on spawned Tokio tasks, so [`observe`](Self::observe) and
/// [`refresh`](Self::refresh) must be called from within a Tokio runtime.
/// Results that arrive after the key has changed are discarded; the underlying
/// fetch is not cancelled.
pub struct FetchBinding {
    coordinator: Arc<FetchCoordinator>,
    state: Arc<watch::Sender<FetchState>>,
    generation: Arc<AtomicU64>,
    key: Option<String>,
}

impl std::fmt::Debug for FetchBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchBinding")
            .field("key", &self.key)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl FetchBinding {
    /// Creates a binding in the initial state, observing nothing
    pub fn new(coordinator: Arc<FetchCoordinator>) -> Self {
        let (state, _) = watch::channel(FetchState::initial());
        Self {
            coordinator,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            key: None,
        }
    }

    /// Creates a binding and immediately starts observing `key`
    pub fn observing(coordinator: Arc<FetchCoordinator>, key: impl Into<String>) -> Self {
        let mut binding = Self::new(coordinator);
        binding.observe(key);
        binding
    }

    /// Currently observed key
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Current state
    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every published state change
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    /// Points the binding at `key`
    ///
    /// Observing the key already being observed does nothing; use
    /// [`refresh`](Self::refresh) to re-run it.
    pub fn observe(&mut self, key: impl Into<String>) {
        let key = key.into();
        if self.key.as_deref() == Some(key.as_str()) {
            return;
        }
        self.key = Some(key.clone());
        self.start(key);
    }

    /// Re-runs resolution for the current key
    ///
    /// A fresh cache entry is served again without fetching; an expired one is
    /// re-fetched.
    pub fn refresh(&mut self) {
        if let Some(key) = self.key.clone() {
            self.start(key);
        }
    }

    /// Stops observing and returns to the initial state
    ///
    /// A resolution still in flight will not be applied.
    pub fn reset(&mut self) {
        self.key = None;
        let generation = &self.generation;
        self.state.send_modify(|state| {
            generation.fetch_add(1, Ordering::SeqCst);
            *state = FetchState::initial();
        });
    }

    /// Waits until the binding is no longer loading and returns that state
    pub async fn settled(&self) -> FetchState {
        let mut receiver = self.state.subscribe();
        let settled = match receiver.wait_for(|state| !state.is_loading).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.state())
    }

    /// Starts a new generation for `key`
    ///
    /// A fresh hit takes the coordinator's cache path (`cached`, the same check
    /// `resolve` makes first) synchronously instead of calling `resolve` on a
    /// task. Neither path fetches, and the hit is published without a loading
    /// state in between.
    fn start(&mut self, key: String) {
        let cached = self.coordinator.cached(&key);
        let generation = &self.generation;
        let mut current = 0;

        self.state.send_modify(|state| {
            current = generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = match &cached {
                Some(data) => FetchState::success(data.clone()),
                None => FetchState::loading(),
            };
        });

        if cached.is_some() {
            debug!(key = %key, generation = current, "Binding served from cache");
            return;
        }

        debug!(key = %key, generation = current, "Binding resolving");
        let coordinator = self.coordinator.clone();
        let state = self.state.clone();
        let generation = self.generation.clone();

        tokio::spawn(async move {
            let outcome = coordinator.resolve(&key).await;
            let applied = state.send_if_modified(|state| {
                if generation.load(Ordering::SeqCst) != current {
                    return false;
                }
                *state = FetchState::from_outcome(outcome);
                true
            });
            if !applied {
                debug!(key = %key, generation = current, "Discarded stale resolution");
            }
        });
    }
}
