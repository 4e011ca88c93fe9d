//! The value handed back to whoever asked for a match.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::products::ScoredCandidate;

/// Why a match request did not produce a candidate.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MatchFailure {
    #[error("unsupported marketplace: {0}")]
    UnsupportedMarketplace(String),

    #[error("no matching candidates found")]
    NoCandidates,

    #[error("{0}")]
    ExtractionError(String),

    #[error("Timeout waiting for match result")]
    Timeout,

    #[error("match request cancelled")]
    Cancelled,

    #[error("best candidate score {best_score:.3} is below the minimum similarity {min_similarity:.3}")]
    BelowThreshold { best_score: f64, min_similarity: f64 },

    #[error("failed to open search context: {0}")]
    ContextLaunch(String),
}

/// Outcome of one match request.
///
/// `success` is `true` exactly when `matched` is `Some`. A successful result
/// may still be flagged `low_confidence` when the winning candidate scored
/// below the configured minimum similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub success: bool,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<ScoredCandidate>,
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MatchFailure>,
}

impl MatchResult {
    #[must_use]
    pub fn found(candidate: ScoredCandidate, low_confidence: bool) -> Self {
        Self {
            success: true,
            matched: Some(candidate),
            low_confidence,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: MatchFailure) -> Self {
        Self {
            success: false,
            matched: None,
            low_confidence: false,
            error: Some(error),
        }
    }

    /// Human-readable error message, if the request failed.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

impl From<MatchFailure> for MatchResult {
    fn from(error: MatchFailure) -> Self {
        Self::failure(error)
    }
}
