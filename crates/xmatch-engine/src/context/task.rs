use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use xmatch_core::{BelowThresholdPolicy, MatchFailure};
use xmatch_scraper::{extractor_for, PageFetcher};

use super::{
    ContextHandle, ContextId, ContextLauncher, ContextMessage, DispatchSignal, MessageKind,
};
use crate::error::EngineError;
use crate::handoff::{run_blocking, HandoffStore};
use crate::selector::{select_best, SelectionPolicy};

/// [`ContextLauncher`] that runs each context as a spawned tokio task with
/// its own view of the page fetcher.
pub struct TaskContextLauncher<F> {
    fetcher: Arc<F>,
    store: Arc<dyn HandoffStore>,
    settle_delay: Duration,
}

impl<F> TaskContextLauncher<F>
where
    F: PageFetcher + 'static,
{
    #[must_use]
    pub fn new(fetcher: F, store: Arc<dyn HandoffStore>, settle_delay: Duration) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            store,
            settle_delay,
        }
    }
}

impl<F> ContextLauncher for TaskContextLauncher<F>
where
    F: PageFetcher + 'static,
{
    fn open(
        &self,
        url: &str,
        request_id: Uuid,
        outbox: mpsc::Sender<ContextMessage>,
    ) -> Result<ContextHandle, EngineError> {
        let id = ContextId::new();
        let (dispatch_tx, dispatch_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_search_context(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            self.settle_delay,
            url.to_owned(),
            request_id,
            id,
            dispatch_rx,
            outbox,
            cancel.clone(),
        ));
        tracing::debug!(context = %id, %request_id, url, "search context opened");

        Ok(ContextHandle::new(id, dispatch_tx, cancel).with_task(task))
    }
}

/// Body of one search context.
///
/// Waits for the dispatch signal, reads the handoff entry, lets the page
/// settle, then fetches, extracts, scores and selects. Posts exactly one
/// message unless cancelled first.
#[allow(clippy::too_many_arguments)]
pub async fn run_search_context<F>(
    fetcher: Arc<F>,
    store: Arc<dyn HandoffStore>,
    settle_delay: Duration,
    url: String,
    request_id: Uuid,
    origin: ContextId,
    dispatch: oneshot::Receiver<DispatchSignal>,
    outbox: mpsc::Sender<ContextMessage>,
    cancel: CancellationToken,
) where
    F: PageFetcher,
{
    let signal = tokio::select! {
        () = cancel.cancelled() => return,
        signal = dispatch => match signal {
            Ok(signal) => signal,
            Err(_) => {
                tracing::debug!(context = %origin, "dispatch sender dropped before signalling");
                return;
            }
        },
    };

    let kind = tokio::select! {
        () = cancel.cancelled() => return,
        kind = search(fetcher.as_ref(), &store, settle_delay, &url, request_id, signal) => kind,
    };

    if outbox.send(ContextMessage { origin, kind }).await.is_err() {
        tracing::debug!(context = %origin, "coordinator stopped listening before the reply");
    }
}

async fn search<F: PageFetcher>(
    fetcher: &F,
    store: &Arc<dyn HandoffStore>,
    settle_delay: Duration,
    url: &str,
    request_id: Uuid,
    signal: DispatchSignal,
) -> MessageKind {
    if signal.request_id != request_id {
        return MessageKind::MatchError {
            message: format!(
                "dispatch for request {} reached context opened for {request_id}",
                signal.request_id
            ),
        };
    }

    let entry = match run_blocking(store, move |s| s.get(request_id)).await {
        Ok(Some(entry)) if entry.match_in_progress => entry,
        Ok(_) => {
            return MessageKind::MatchError {
                message: format!("no match in progress for request {request_id}"),
            }
        }
        Err(e) => {
            return MessageKind::MatchError {
                message: e.to_string(),
            }
        }
    };

    if !settle_delay.is_zero() {
        tokio::time::sleep(settle_delay).await;
    }

    let page = match fetcher.fetch(url).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(%request_id, url, error = %e, "search page fetch failed");
            return MessageKind::MatchError {
                message: e.to_string(),
            };
        }
    };

    let extractor = match extractor_for(entry.target_marketplace) {
        Ok(extractor) => extractor,
        Err(e) => {
            return MessageKind::MatchError {
                message: e.to_string(),
            }
        }
    };
    let report = extractor.extract_report(&page);
    tracing::info!(
        %request_id,
        marketplace = %report.marketplace,
        status = ?report.status,
        strategy = report.strategy.unwrap_or("none"),
        candidates = report.candidates.len(),
        "candidates extracted"
    );

    // The coordinator owns the below-threshold decision; here a weak winner
    // is only flagged.
    let policy = SelectionPolicy {
        min_similarity: entry.min_similarity,
        on_below_threshold: BelowThresholdPolicy::ReturnAnyway,
    };
    let result = select_best(&entry.source_product_for_match, &report.candidates, &policy);
    match (result.matched, result.error) {
        (Some(candidate), _) => MessageKind::MatchFound {
            candidate,
            low_confidence: result.low_confidence,
        },
        (None, Some(MatchFailure::NoCandidates) | None) => MessageKind::MatchNotFound,
        (None, Some(other)) => MessageKind::MatchError {
            message: other.to_string(),
        },
    }
}
