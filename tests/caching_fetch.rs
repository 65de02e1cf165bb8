//! End-to-end behavior of the cache, coordinator, bindings and snapshot bridge
//!
//! Uses a counting in-memory fetcher and a manual clock so expiry is deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use fetchcache::{
    CacheStore, Clock, FetchBinding, FetchCoordinator, FetchError, FetchState, Fetcher, ManualClock,
    SnapshotBridge, SnapshotError,
};

const API_URL: &str = "https://randomapi.com/api/6de6abfedb24f889e0b5f675edc50deb";

/// Fetcher that replays queued outcomes in order and counts calls
#[derive(Default)]
struct MockFetcher {
    queue: Mutex<VecDeque<Result<Value, FetchError>>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    fn resolves_once(&self, value: Value) -> &Self {
        self.queue.lock().unwrap().push_back(Ok(value));
        self
    }

    fn rejects_once(&self, error: FetchError) -> &Self {
        self.queue.lock().unwrap().push_back(Err(error));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, _key: &str) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::transport("unexpected fetch")))
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<CacheStore>,
    fetcher: Arc<MockFetcher>,
    coordinator: Arc<FetchCoordinator>,
    bridge: SnapshotBridge,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(CacheStore::with_clock(clock.clone()));
        let fetcher = Arc::new(MockFetcher::default());
        let coordinator = Arc::new(FetchCoordinator::new(store.clone(), fetcher.clone()));
        let bridge = SnapshotBridge::new(store.clone());
        Self {
            clock,
            store,
            fetcher,
            coordinator,
            bridge,
        }
    }

    fn bind(&self, key: &str) -> FetchBinding {
        FetchBinding::observing(self.coordinator.clone(), key)
    }

    fn clock_now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }
}

#[test]
fn test_binding_starts_in_initial_state() {
    let harness = Harness::new();
    let binding = FetchBinding::new(harness.coordinator.clone());

    assert_eq!(
        binding.state(),
        FetchState {
            is_loading: false,
            data: None,
            error: None,
        }
    );
}

#[tokio::test]
async fn test_cached_within_window_then_refetched_after_expiry() {
    let harness = Harness::new();
    let first = json!({ "results": [{ "id": 1 }] });
    let second = json!({ "results": [{ "id": 2 }] });
    harness
        .fetcher
        .resolves_once(first.clone())
        .resolves_once(second.clone());

    let binding = harness.bind(API_URL);
    assert!(binding.state().is_loading);
    assert_eq!(binding.settled().await, FetchState::success(first.clone()));

    // A second binding right away is served from the cache.
    let again = harness.bind(API_URL);
    assert_eq!(again.state(), FetchState::success(first));
    assert_eq!(harness.fetcher.calls(), 1);

    harness.clock.advance(Duration::from_secs(61));

    let third = harness.bind(API_URL);
    assert!(third.state().is_loading);
    assert_eq!(third.settled().await, FetchState::success(second));
    assert_eq!(harness.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_repeated_resolution_fetches_once() {
    let harness = Harness::new();
    harness.fetcher.resolves_once(json!("only"));

    for _ in 0..20 {
        assert_eq!(harness.coordinator.resolve(API_URL).await, Ok(json!("only")));
    }

    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_network_error_surfaces_on_binding_and_is_not_cached() {
    let harness = Harness::new();
    harness
        .fetcher
        .rejects_once(FetchError::transport("Network error"))
        .resolves_once(json!("second try"));

    let binding = harness.bind("K2");
    let state = binding.settled().await;

    assert!(!state.is_loading);
    assert!(state.data.is_none());
    assert_eq!(
        state.error.as_ref().map(ToString::to_string).as_deref(),
        Some("Network error")
    );
    assert!(!harness.store.contains_key("K2"));

    let retry = harness.bind("K2");
    assert_eq!(retry.settled().await, FetchState::success(json!("second try")));
    assert_eq!(harness.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_http_status_error_message() {
    let harness = Harness::new();
    harness
        .fetcher
        .rejects_once(FetchError::UnsuccessfulResponse { status: 404 });

    let state = harness.bind(API_URL).settled().await;

    assert_eq!(
        state.error.map(|err| err.to_string()),
        Some("HTTP error! status: 404".to_string())
    );
}

#[tokio::test]
async fn test_preload_then_binding_needs_no_fetch() {
    let harness = Harness::new();
    let data = json!({ "results": [{ "id": 1, "name": "Test" }] });
    harness.fetcher.resolves_once(data.clone());

    harness.coordinator.preload(API_URL).await;
    let binding = harness.bind(API_URL);

    assert_eq!(binding.state(), FetchState::success(data));
    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_preload_error_is_swallowed() {
    let harness = Harness::new();
    harness
        .fetcher
        .rejects_once(FetchError::transport("Network error"));

    harness.coordinator.preload(API_URL).await;

    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_export_clear_import_reproduces_states_without_fetching() {
    let harness = Harness::new();
    let people = json!([{ "first": "John", "last": "Doe" }]);
    let places = json!({ "city": "Vancouver" });
    harness
        .fetcher
        .resolves_once(people.clone())
        .resolves_once(places.clone());
    let other_url = format!("{}?param=1", API_URL);

    harness.coordinator.preload(API_URL).await;
    harness.coordinator.preload(&other_url).await;

    let exported = harness.bridge.export();
    harness.store.clear();
    harness.bridge.import(&exported).expect("import should succeed");

    assert_eq!(harness.bind(API_URL).state(), FetchState::success(people));
    assert_eq!(harness.bind(&other_url).state(), FetchState::success(places));
    assert_eq!(harness.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_import_invalid_text_fails_and_keeps_cache() {
    let harness = Harness::new();
    harness.fetcher.resolves_once(json!("kept"));
    harness.coordinator.preload(API_URL).await;

    let result = harness.bridge.import("invalid JSON");

    assert!(matches!(result, Err(SnapshotError::Malformed(_))));
    assert_eq!(harness.bind(API_URL).state(), FetchState::success(json!("kept")));
    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_clear_forces_refetch_for_every_key() {
    let harness = Harness::new();
    harness
        .fetcher
        .resolves_once(json!(1))
        .resolves_once(json!(2))
        .resolves_once(json!(3))
        .resolves_once(json!(4));
    let other_url = format!("{}?param=1", API_URL);

    harness.coordinator.preload_all([API_URL, other_url.as_str()]).await;
    harness.store.clear();

    let first = harness.bind(API_URL);
    let second = harness.bind(&other_url);
    assert!(first.state().is_loading);
    assert!(second.state().is_loading);

    let first = first.settled().await;
    let second = second.settled().await;
    assert!(first.is_terminal() && second.is_terminal());
    assert_eq!(harness.fetcher.calls(), 4);
}

#[tokio::test]
async fn test_expired_imported_entry_is_refetched() {
    let harness = Harness::new();
    harness.fetcher.resolves_once(json!("fresh"));
    // Stored well over a minute before the manual clock's start.
    let stale_ms = harness.clock_now_ms() - 120_000;
    let snapshot = format!(r#"{{"{}":{{"data":"stale","timestamp":{}}}}}"#, API_URL, stale_ms);

    harness.bridge.import(&snapshot).unwrap();
    let binding = harness.bind(API_URL);

    assert!(binding.state().is_loading);
    assert_eq!(binding.settled().await, FetchState::success(json!("fresh")));
    assert_eq!(harness.fetcher.calls(), 1);
}

/// Fetcher whose first call panics; later calls succeed
#[derive(Default)]
struct PanicsOnceFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for PanicsOnceFetcher {
    async fn fetch(&self, _key: &str) -> Result<Value, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("fetcher bug");
        }
        Ok(json!({ "results": [{ "id": 1 }] }))
    }
}

#[tokio::test]
async fn test_panicking_fetcher_settles_binding_and_next_binding_retries() {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(CacheStore::with_clock(clock.clone()));
    let fetcher = Arc::new(PanicsOnceFetcher::default());
    let coordinator = Arc::new(FetchCoordinator::new(store.clone(), fetcher.clone()));

    let failed = FetchBinding::observing(coordinator.clone(), "K")
        .settled()
        .await;
    assert!(!failed.is_loading);
    assert!(failed.data.is_none());
    assert!(matches!(failed.error, Some(FetchError::TransportFailure(_))));
    assert!(!store.contains_key("K"));

    let retried = FetchBinding::observing(coordinator, "K").settled().await;
    assert_eq!(
        retried,
        FetchState::success(json!({ "results": [{ "id": 1 }] }))
    );
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}
