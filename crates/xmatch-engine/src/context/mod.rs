//! Isolated search contexts.
//!
//! A context is opened on a target marketplace's search URL, waits for the
//! coordinator's dispatch signal, and answers with exactly one
//! [`ContextMessage`] on the outbox it was given. The coordinator and the
//! context share nothing but the [`HandoffStore`].

mod task;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use xmatch_core::ScoredCandidate;

use crate::error::EngineError;

pub use task::{run_search_context, TaskContextLauncher};

/// Identity of one opened context. Messages are attributed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tells a context to start extracting for `request_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSignal {
    pub request_id: Uuid,
}

/// The single reply a context sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    MatchFound {
        candidate: ScoredCandidate,
        low_confidence: bool,
    },
    MatchNotFound,
    MatchError {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub origin: ContextId,
    #[serde(flatten)]
    pub kind: MessageKind,
}

/// Opens search contexts.
pub trait ContextLauncher: Send + Sync {
    /// Opens a context on `url` for `request_id`. The context posts its reply
    /// to `outbox`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContextLaunch`] if the context cannot be created.
    fn open(
        &self,
        url: &str,
        request_id: Uuid,
        outbox: mpsc::Sender<ContextMessage>,
    ) -> Result<ContextHandle, EngineError>;
}

/// The coordinator's end of an opened context.
#[derive(Debug)]
pub struct ContextHandle {
    id: ContextId,
    dispatch: Option<oneshot::Sender<DispatchSignal>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ContextHandle {
    #[must_use]
    pub fn new(
        id: ContextId,
        dispatch: oneshot::Sender<DispatchSignal>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            dispatch: Some(dispatch),
            cancel,
            task: None,
        }
    }

    /// Attaches the task running the context so [`ContextHandle::close`] can
    /// wait for it.
    #[must_use]
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Sends the dispatch signal. A context accepts exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContextClosed`] if the signal was already sent
    /// or the context has gone away.
    pub fn dispatch(&mut self, signal: DispatchSignal) -> Result<(), EngineError> {
        let sender = self
            .dispatch
            .take()
            .ok_or_else(|| EngineError::ContextClosed(self.id.to_string()))?;
        sender
            .send(signal)
            .map_err(|_| EngineError::ContextClosed(self.id.to_string()))
    }

    /// Cancels the context and waits for its task to exit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Teardown`] if the context task panicked.
    pub async fn close(mut self) -> Result<(), EngineError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(()) => Ok(()),
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(EngineError::Teardown(format!("context {}: {e}", self.id))),
            },
            None => Ok(()),
        }
    }
}

impl Drop for ContextHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
