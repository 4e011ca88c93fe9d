//! Integration tests for `Coordinator`.
//!
//! Stub launchers stand in for search contexts that stall, close early, or
//! misattribute messages; the end-to-end tests drive the real task launcher
//! against static pages and a `wiremock` server.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xmatch_core::{
    BelowThresholdPolicy, Marketplace, MarketplaceEndpoints, MatchFailure, SearchOptions,
    SourceProduct,
};
use xmatch_engine::{
    ContextHandle, ContextId, ContextLauncher, ContextMessage, Coordinator, DispatchSignal,
    EngineError, HandoffStore, JsonFileHandoffStore, MemoryHandoffStore, MessageKind,
    TaskContextLauncher,
};
use xmatch_scraper::{HttpPageFetcher, StaticPageFetcher};

const AMAZON_RESULTS: &str = r#"<html><body>
<div data-component-type="s-search-result" data-asin="B0001">
  <h2><a class="a-link-normal" href="/Acme-Blue-Widget-10oz/dp/B0001"><span>Acme Blue Widget 10oz</span></a></h2>
  <span class="a-price"><span class="a-offscreen">$9.99</span></span>
</div>
<div data-component-type="s-search-result" data-asin="B0002">
  <h2><a class="a-link-normal" href="/Unrelated/dp/B0002"><span>Totally Unrelated Item</span></a></h2>
  <span class="a-price"><span class="a-offscreen">$5.00</span></span>
</div>
</body></html>"#;

fn acme() -> SourceProduct {
    SourceProduct::new("Acme Blue Widget 10oz", Marketplace::Target)
        .with_brand("Acme")
        .with_price(12.49)
}

fn quick(timeout_ms: u64) -> Option<SearchOptions> {
    Some(SearchOptions::default().with_timeout_ms(timeout_ms))
}

fn coordinator<L: ContextLauncher>(launcher: L, store: &Arc<MemoryHandoffStore>) -> Coordinator<L> {
    let shared: Arc<dyn HandoffStore> = store.clone();
    Coordinator::new(launcher, shared, MarketplaceEndpoints::default())
}

fn static_coordinator(
    html: &str,
    store: &Arc<MemoryHandoffStore>,
) -> Coordinator<TaskContextLauncher<StaticPageFetcher>> {
    let shared: Arc<dyn HandoffStore> = store.clone();
    let launcher = TaskContextLauncher::new(StaticPageFetcher::new(html), shared, Duration::ZERO);
    coordinator(launcher, store)
}

// ---------------------------------------------------------------------------
// Stub launchers
// ---------------------------------------------------------------------------

/// Opens contexts that never reply until torn down.
struct SilentLauncher;

impl ContextLauncher for SilentLauncher {
    fn open(
        &self,
        _url: &str,
        _request_id: Uuid,
        outbox: mpsc::Sender<ContextMessage>,
    ) -> Result<ContextHandle, EngineError> {
        let (dispatch_tx, dispatch_rx) = oneshot::channel::<DispatchSignal>();
        let cancel = CancellationToken::new();
        let watched = cancel.clone();
        let task = tokio::spawn(async move {
            let _keep = (outbox, dispatch_rx);
            watched.cancelled().await;
        });
        Ok(ContextHandle::new(ContextId::new(), dispatch_tx, cancel).with_task(task))
    }
}

/// Like [`SilentLauncher`], keeping each context's cancel token.
#[derive(Default)]
struct WatchedLauncher {
    opened: Arc<Mutex<Vec<CancellationToken>>>,
}

impl ContextLauncher for WatchedLauncher {
    fn open(
        &self,
        _url: &str,
        _request_id: Uuid,
        outbox: mpsc::Sender<ContextMessage>,
    ) -> Result<ContextHandle, EngineError> {
        let (dispatch_tx, dispatch_rx) = oneshot::channel::<DispatchSignal>();
        let cancel = CancellationToken::new();
        self.opened.lock().unwrap().push(cancel.clone());
        let watched = cancel.clone();
        let task = tokio::spawn(async move {
            let _keep = (outbox, dispatch_rx);
            watched.cancelled().await;
        });
        Ok(ContextHandle::new(ContextId::new(), dispatch_tx, cancel).with_task(task))
    }
}

/// Opens contexts that hang up without replying.
struct ClosingLauncher;

impl ContextLauncher for ClosingLauncher {
    fn open(
        &self,
        _url: &str,
        _request_id: Uuid,
        outbox: mpsc::Sender<ContextMessage>,
    ) -> Result<ContextHandle, EngineError> {
        drop(outbox);
        let (dispatch_tx, dispatch_rx) = oneshot::channel::<DispatchSignal>();
        let task = tokio::spawn(async move {
            let _ = dispatch_rx.await;
        });
        Ok(ContextHandle::new(ContextId::new(), dispatch_tx, CancellationToken::new()).with_task(task))
    }
}

/// Refuses to open contexts.
struct FailingLauncher;

impl ContextLauncher for FailingLauncher {
    fn open(
        &self,
        _url: &str,
        _request_id: Uuid,
        _outbox: mpsc::Sender<ContextMessage>,
    ) -> Result<ContextHandle, EngineError> {
        Err(EngineError::ContextLaunch("no browser available".to_owned()))
    }
}

/// Opens contexts that first relay a message from another context, then
/// reply on their own behalf.
struct ImpostorLauncher;

impl ContextLauncher for ImpostorLauncher {
    fn open(
        &self,
        _url: &str,
        _request_id: Uuid,
        outbox: mpsc::Sender<ContextMessage>,
    ) -> Result<ContextHandle, EngineError> {
        let id = ContextId::new();
        let (dispatch_tx, dispatch_rx) = oneshot::channel::<DispatchSignal>();
        let task = tokio::spawn(async move {
            if dispatch_rx.await.is_err() {
                return;
            }
            let _ = outbox
                .send(ContextMessage {
                    origin: ContextId::new(),
                    kind: MessageKind::MatchError {
                        message: "from another tab".to_owned(),
                    },
                })
                .await;
            let _ = outbox
                .send(ContextMessage {
                    origin: id,
                    kind: MessageKind::MatchNotFound,
                })
                .await;
        });
        Ok(ContextHandle::new(id, dispatch_tx, CancellationToken::new()).with_task(task))
    }
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_context_times_out_and_clears_handoff() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = coordinator(SilentLauncher, &store);

    let started = Instant::now();
    let result = coordinator
        .find_match(&acme(), Marketplace::Amazon, quick(100))
        .await;

    assert!(
        started.elapsed() < Duration::from_secs(2),
        "timed out too slowly: {:?}",
        started.elapsed()
    );
    assert!(!result.success);
    assert_eq!(result.error, Some(MatchFailure::Timeout));
    assert_eq!(
        result.error_message().as_deref(),
        Some("Timeout waiting for match result")
    );
    assert!(store.is_empty().unwrap(), "handoff entry should be cleared");
}

#[tokio::test]
async fn cancellation_resolves_and_clears_handoff() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = coordinator(SilentLauncher, &store);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = coordinator
        .find_match_with_cancel(&acme(), Marketplace::Amazon, quick(30_000), cancel)
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.error, Some(MatchFailure::Cancelled));
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn already_cancelled_token_never_opens_context() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = coordinator(FailingLauncher, &store);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = coordinator
        .find_match_with_cancel(&acme(), Marketplace::Amazon, None, cancel)
        .await;
    assert_eq!(result.error, Some(MatchFailure::Cancelled));
}

#[tokio::test]
async fn closed_context_is_an_extraction_error() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = coordinator(ClosingLauncher, &store);

    let result = coordinator
        .find_match(&acme(), Marketplace::Walmart, quick(5_000))
        .await;
    assert!(matches!(result.error, Some(MatchFailure::ExtractionError(_))));
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn launch_failure_is_reported() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = coordinator(FailingLauncher, &store);

    let result = coordinator.find_match(&acme(), Marketplace::Ebay, None).await;
    match result.error {
        Some(MatchFailure::ContextLaunch(message)) => {
            assert!(message.contains("no browser available"), "{message}");
        }
        other => panic!("expected ContextLaunch, got {other:?}"),
    }
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn source_only_target_is_unsupported() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = coordinator(SilentLauncher, &store);

    let result = coordinator.find_match(&acme(), Marketplace::Target, None).await;
    assert_eq!(
        result.error,
        Some(MatchFailure::UnsupportedMarketplace("target".to_owned()))
    );
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn messages_from_other_contexts_are_ignored() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = coordinator(ImpostorLauncher, &store);

    let result = coordinator
        .find_match(&acme(), Marketplace::Amazon, quick(5_000))
        .await;
    assert_eq!(result.error, Some(MatchFailure::NoCandidates));
}

// ---------------------------------------------------------------------------
// Task launcher, static pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn best_candidate_is_returned() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = static_coordinator(AMAZON_RESULTS, &store);

    let result = coordinator
        .find_match(&acme(), Marketplace::Amazon, quick(5_000))
        .await;

    assert!(result.success, "{result:?}");
    assert!(!result.low_confidence);
    let best = result.matched.unwrap();
    assert_eq!(best.candidate.title, "Acme Blue Widget 10oz");
    assert_eq!(best.candidate.price, Some(9.99));
    assert!(best.title_similarity >= 0.9);
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn zero_candidates_is_a_clean_failure() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = static_coordinator("<html><body>No results for your query.</body></html>", &store);

    let result = coordinator
        .find_match(&acme(), Marketplace::Ebay, quick(5_000))
        .await;
    assert!(!result.success);
    assert_eq!(result.error, Some(MatchFailure::NoCandidates));
}

#[tokio::test]
async fn fail_policy_rejects_weak_match() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = static_coordinator(AMAZON_RESULTS, &store);
    let source = SourceProduct::new("Garden Hose 50ft", Marketplace::Walmart).with_brand("Flexi");
    let options = SearchOptions::default()
        .with_timeout_ms(5_000)
        .with_min_similarity(0.6)
        .with_below_threshold(BelowThresholdPolicy::Fail);

    let result = coordinator
        .find_match(&source, Marketplace::Amazon, Some(options))
        .await;
    assert!(matches!(
        result.error,
        Some(MatchFailure::BelowThreshold { .. })
    ));
}

#[tokio::test]
async fn repeated_requests_give_the_same_result() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = static_coordinator(AMAZON_RESULTS, &store);

    let first = coordinator
        .find_match(&acme(), Marketplace::Amazon, quick(5_000))
        .await;
    let second = coordinator
        .find_match(&acme(), Marketplace::Amazon, quick(5_000))
        .await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    let store = Arc::new(MemoryHandoffStore::new());
    let coordinator = static_coordinator(AMAZON_RESULTS, &store);
    let acme = acme();
    let unrelated = SourceProduct::new("Totally Unrelated Item", Marketplace::Target);

    let (a, b) = tokio::join!(
        coordinator.find_match(&acme, Marketplace::Amazon, quick(5_000)),
        coordinator.find_match(&unrelated, Marketplace::Amazon, quick(5_000)),
    );

    assert_eq!(a.matched.unwrap().candidate.title, "Acme Blue Widget 10oz");
    assert_eq!(b.matched.unwrap().candidate.title, "Totally Unrelated Item");
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn dropped_request_cancels_context_and_clears_handoff() {
    let store = Arc::new(MemoryHandoffStore::new());
    let launcher = WatchedLauncher::default();
    let opened = Arc::clone(&launcher.opened);
    let coordinator = coordinator(launcher, &store);
    let acme = acme();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        coordinator.find_match(&acme, Marketplace::Amazon, quick(30_000)),
    )
    .await;
    assert!(abandoned.is_err());

    let tokens = opened.lock().unwrap().clone();
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_cancelled());

    tokio::time::timeout(Duration::from_secs(2), async {
        while !store.is_empty().unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("handoff entry still present after the request was dropped");
}

#[tokio::test]
async fn file_store_is_left_empty_after_a_match() {
    let dir = std::env::temp_dir().join(format!("xmatch-handoff-{}", Uuid::new_v4()));
    let shared: Arc<dyn HandoffStore> = Arc::new(JsonFileHandoffStore::new(&dir));
    let launcher = TaskContextLauncher::new(
        StaticPageFetcher::new(AMAZON_RESULTS),
        Arc::clone(&shared),
        Duration::ZERO,
    );
    let coordinator = Coordinator::new(launcher, shared, MarketplaceEndpoints::default());

    let result = coordinator
        .find_match(&acme(), Marketplace::Amazon, quick(5_000))
        .await;

    assert!(result.success, "{result:?}");
    let leftover = std::fs::read_dir(&dir).map(Iterator::count).unwrap_or(0);
    assert_eq!(leftover, 0);
    let _ = std::fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// Task launcher over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn end_to_end_against_mock_marketplace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s"))
        .and(query_param("k", "Acme Blue Widget 10oz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(AMAZON_RESULTS))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryHandoffStore::new());
    let shared: Arc<dyn HandoffStore> = store.clone();
    let fetcher = HttpPageFetcher::new(5, "xmatch-test/0.1", 0, 0).unwrap();
    let launcher = TaskContextLauncher::new(fetcher, Arc::clone(&shared), Duration::from_millis(10));
    let endpoints = MarketplaceEndpoints {
        amazon: server.uri(),
        ..MarketplaceEndpoints::default()
    };
    let coordinator = Coordinator::new(launcher, shared, endpoints);

    let result = coordinator
        .find_match(&acme(), Marketplace::Amazon, quick(10_000))
        .await;

    assert!(result.success, "{result:?}");
    let best = result.matched.unwrap();
    assert_eq!(
        best.candidate.url,
        format!("{}/Acme-Blue-Widget-10oz/dp/B0001", server.uri())
    );
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn upstream_error_surfaces_as_extraction_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryHandoffStore::new());
    let shared: Arc<dyn HandoffStore> = store.clone();
    let fetcher = HttpPageFetcher::new(5, "xmatch-test/0.1", 0, 0).unwrap();
    let launcher = TaskContextLauncher::new(fetcher, Arc::clone(&shared), Duration::ZERO);
    let endpoints = MarketplaceEndpoints {
        walmart: server.uri(),
        ..MarketplaceEndpoints::default()
    };
    let coordinator = Coordinator::new(launcher, shared, endpoints);

    let result = coordinator
        .find_match(&acme(), Marketplace::Walmart, quick(10_000))
        .await;
    match result.error {
        Some(MatchFailure::ExtractionError(message)) => {
            assert!(message.contains("not found"), "{message}");
        }
        other => panic!("expected ExtractionError, got {other:?}"),
    }
}
