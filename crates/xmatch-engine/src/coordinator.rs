//! End-to-end lifecycle of a match request.
//!
//! ```text
//! Idle -> Dispatching -> AwaitingResult -> Resolved -> CleanedUp
//! ```
//!
//! Every path, including early failures, passes through cleanup: the context
//! is torn down and the handoff entry cleared. Neither step can change the
//! result already resolved. A request future dropped before it resolves
//! still cancels its context and clears its entry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use xmatch_core::{
    AppConfig, Marketplace, MarketplaceEndpoints, MatchFailure, MatchResult, SearchOptions,
    SourceProduct,
};
use xmatch_scraper::HttpPageFetcher;

use crate::context::{
    ContextHandle, ContextLauncher, ContextMessage, DispatchSignal, MessageKind,
    TaskContextLauncher,
};
use crate::error::EngineError;
use crate::handoff::{
    run_blocking, HandoffEntry, HandoffStore, JsonFileHandoffStore, MemoryHandoffStore,
};
use crate::query::build_search_url;
use crate::selector::{apply_policy, SelectionPolicy};

/// Lifecycle stage of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Dispatching,
    AwaitingResult,
    Resolved,
    CleanedUp,
}

impl SearchState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::AwaitingResult => "awaiting_result",
            Self::Resolved => "resolved",
            Self::CleanedUp => "cleaned_up",
        }
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping for one in-flight request.
struct SearchRequest<'a> {
    request_id: Uuid,
    source: &'a SourceProduct,
    target: Marketplace,
    options: SearchOptions,
    state: SearchState,
    handle: Option<ContextHandle>,
    store: Arc<dyn HandoffStore>,
}

impl SearchRequest<'_> {
    fn advance(&mut self, next: SearchState) {
        tracing::debug!(
            request_id = %self.request_id,
            from = %self.state,
            to = %next,
            "search state transition"
        );
        self.state = next;
    }
}

impl Drop for SearchRequest<'_> {
    fn drop(&mut self) {
        if self.state == SearchState::CleanedUp {
            return;
        }
        // The context handle cancels itself when dropped with the request.
        tracing::warn!(
            request_id = %self.request_id,
            state = %self.state,
            "match request abandoned before cleanup"
        );
        let request_id = self.request_id;
        let store = Arc::clone(&self.store);
        let clear = move || {
            if let Err(e) = store.clear(request_id) {
                tracing::warn!(%request_id, error = %e, "failed to clear abandoned handoff entry");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => drop(runtime.spawn_blocking(clear)),
            Err(_) => clear(),
        }
    }
}

/// Runs match requests against target marketplaces.
///
/// State is keyed by request id, so one coordinator may serve any number of
/// concurrent requests.
pub struct Coordinator<L> {
    launcher: L,
    store: Arc<dyn HandoffStore>,
    endpoints: MarketplaceEndpoints,
    defaults: SearchOptions,
}

impl<L: ContextLauncher> Coordinator<L> {
    #[must_use]
    pub fn new(launcher: L, store: Arc<dyn HandoffStore>, endpoints: MarketplaceEndpoints) -> Self {
        Self {
            launcher,
            store,
            endpoints,
            defaults: SearchOptions::default(),
        }
    }

    /// Options used when a caller passes `None`.
    #[must_use]
    pub fn with_default_options(mut self, defaults: SearchOptions) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn HandoffStore> {
        &self.store
    }

    /// Finds the best listing for `source` on `target`.
    ///
    /// Never fails: every outcome, including timeouts and infrastructure
    /// errors, is reported through the returned [`MatchResult`].
    pub async fn find_match(
        &self,
        source: &SourceProduct,
        target: Marketplace,
        options: Option<SearchOptions>,
    ) -> MatchResult {
        self.find_match_with_cancel(source, target, options, CancellationToken::new())
            .await
    }

    /// Like [`Coordinator::find_match`], resolving to
    /// [`MatchFailure::Cancelled`] once `cancel` fires.
    pub async fn find_match_with_cancel(
        &self,
        source: &SourceProduct,
        target: Marketplace,
        options: Option<SearchOptions>,
        cancel: CancellationToken,
    ) -> MatchResult {
        let mut request = SearchRequest {
            request_id: Uuid::new_v4(),
            source,
            target,
            options: options.unwrap_or_else(|| self.defaults.clone()),
            state: SearchState::Idle,
            handle: None,
            store: Arc::clone(&self.store),
        };
        tracing::info!(
            request_id = %request.request_id,
            source_marketplace = %source.marketplace,
            %target,
            title = %source.title,
            "match requested"
        );

        let result = self.run(&mut request, &cancel).await;
        request.advance(SearchState::Resolved);
        log_outcome(request.request_id, &result);

        self.cleanup(&mut request).await;
        result
    }

    async fn run(&self, request: &mut SearchRequest<'_>, cancel: &CancellationToken) -> MatchResult {
        request.advance(SearchState::Dispatching);
        let request_id = request.request_id;

        let entry = HandoffEntry::in_progress(
            request.source.clone(),
            request.target,
            request.options.min_similarity,
        );
        if let Err(e) = run_blocking(&self.store, move |s| s.put(request_id, &entry)).await {
            return MatchFailure::ContextLaunch(format!("handoff state unavailable: {e}")).into();
        }

        let url = match build_search_url(request.source, request.target, &request.options, &self.endpoints) {
            Ok(url) => url,
            Err(failure) => return failure.into(),
        };

        if cancel.is_cancelled() {
            return MatchFailure::Cancelled.into();
        }

        let (outbox, mut inbox) = mpsc::channel::<ContextMessage>(4);
        let handle = match self.launcher.open(&url, request_id, outbox) {
            Ok(handle) => request.handle.insert(handle),
            Err(e) => return MatchFailure::ContextLaunch(e.to_string()).into(),
        };
        let context_id = handle.id();
        tracing::debug!(%request_id, context = %context_id, url = %url, "search context ready");

        if let Err(e) = handle.dispatch(DispatchSignal { request_id }) {
            return MatchFailure::ExtractionError(e.to_string()).into();
        }
        request.advance(SearchState::AwaitingResult);

        let deadline = tokio::time::sleep(request.options.timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return MatchFailure::Cancelled.into(),
                () = &mut deadline => return MatchFailure::Timeout.into(),
                message = inbox.recv() => match message {
                    None => {
                        return MatchFailure::ExtractionError(
                            "search context closed without a result".to_owned(),
                        )
                        .into();
                    }
                    Some(message) if message.origin != context_id => {
                        tracing::warn!(
                            %request_id,
                            expected = %context_id,
                            origin = %message.origin,
                            "ignoring message from unrelated context"
                        );
                    }
                    Some(message) => return resolve(message.kind, &request.options),
                },
            }
        }
    }

    async fn cleanup(&self, request: &mut SearchRequest<'_>) {
        if let Some(handle) = request.handle.take() {
            let context = handle.id();
            if let Err(e) = handle.close().await {
                tracing::warn!(request_id = %request.request_id, %context, error = %e, "context teardown failed");
            }
        }
        let request_id = request.request_id;
        if let Err(e) = run_blocking(&self.store, move |s| s.clear(request_id)).await {
            tracing::warn!(%request_id, error = %e, "failed to clear handoff entry");
        }
        request.advance(SearchState::CleanedUp);
    }
}

impl Coordinator<TaskContextLauncher<HttpPageFetcher>> {
    /// Builds a coordinator that fetches live search pages over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scraper`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, EngineError> {
        let store: Arc<dyn HandoffStore> = match &config.handoff_path {
            Some(path) => Arc::new(JsonFileHandoffStore::new(path)),
            None => Arc::new(MemoryHandoffStore::new()),
        };
        let fetcher = HttpPageFetcher::from_app_config(config)?;
        let launcher = TaskContextLauncher::new(
            fetcher,
            Arc::clone(&store),
            Duration::from_millis(config.settle_delay_ms),
        );
        Ok(Self::new(launcher, store, config.endpoints.clone())
            .with_default_options(config.search.clone()))
    }
}

fn resolve(kind: MessageKind, options: &SearchOptions) -> MatchResult {
    match kind {
        MessageKind::MatchFound {
            candidate,
            low_confidence,
        } => apply_policy(candidate, low_confidence, &SelectionPolicy::from(options)),
        MessageKind::MatchNotFound => MatchFailure::NoCandidates.into(),
        MessageKind::MatchError { message } => MatchFailure::ExtractionError(message).into(),
    }
}

fn log_outcome(request_id: Uuid, result: &MatchResult) {
    match (&result.matched, &result.error) {
        (Some(best), _) => tracing::info!(
            %request_id,
            title = %best.candidate.title,
            score = best.combined_score,
            low_confidence = result.low_confidence,
            "match found"
        ),
        (None, Some(error)) => tracing::info!(%request_id, %error, "match not found"),
        (None, None) => tracing::info!(%request_id, "match not found"),
    }
}
