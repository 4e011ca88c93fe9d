use thiserror::Error;
use xmatch_scraper::ScraperError;

/// Errors from the engine's infrastructure: handoff storage and search
/// contexts. Match outcomes are reported through `MatchResult`, not here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading or writing the file-backed handoff store failed.
    #[error("handoff store I/O error at {path}: {source}")]
    HandoffIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The handoff file exists but does not hold valid handoff JSON.
    #[error("handoff store JSON error: {0}")]
    HandoffSerde(#[from] serde_json::Error),

    /// A thread panicked while holding the handoff store lock.
    #[error("handoff store lock poisoned")]
    HandoffLock,

    /// The blocking task running a store operation panicked or was cancelled.
    #[error("handoff store task failed: {0}")]
    HandoffTask(String),

    #[error("failed to open search context: {0}")]
    ContextLaunch(String),

    /// The dispatch signal could not be delivered.
    #[error("search context {0} is no longer accepting dispatch")]
    ContextClosed(String),

    #[error("search context teardown failed: {0}")]
    Teardown(String),

    #[error(transparent)]
    Scraper(#[from] ScraperError),
}
