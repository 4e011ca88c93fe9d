//! Picks the winning candidate from an extracted list.

use serde::{Deserialize, Serialize};
use xmatch_core::{
    BelowThresholdPolicy, MatchFailure, MatchResult, RawCandidate, ScoredCandidate, SearchOptions,
    SourceProduct,
};

use crate::similarity::score_candidate;

/// Minimum-similarity rule applied to the best candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPolicy {
    pub min_similarity: f64,
    pub on_below_threshold: BelowThresholdPolicy,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from(&SearchOptions::default())
    }
}

impl From<&SearchOptions> for SelectionPolicy {
    fn from(options: &SearchOptions) -> Self {
        Self {
            min_similarity: options.min_similarity,
            on_below_threshold: options.on_below_threshold,
        }
    }
}

/// Scores every valid candidate and returns them best first.
///
/// Candidates missing a title, url or usable price are dropped. Ties keep
/// their extraction order.
#[must_use]
pub fn rank(source: &SourceProduct, candidates: &[RawCandidate]) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|c| c.is_valid())
        .map(|c| score_candidate(source, c))
        .collect();
    // `sort_by` is stable.
    scored.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    scored
}

/// Selects the best candidate for `source`.
#[must_use]
pub fn select_best(
    source: &SourceProduct,
    candidates: &[RawCandidate],
    policy: &SelectionPolicy,
) -> MatchResult {
    let dropped = candidates.iter().filter(|c| !c.is_valid()).count();
    if dropped > 0 {
        tracing::debug!(dropped, "discarded candidates missing title, price or url");
    }

    match rank(source, candidates).into_iter().next() {
        Some(best) => {
            let low_confidence = best.combined_score < policy.min_similarity;
            apply_policy(best, low_confidence, policy)
        }
        None => MatchResult::failure(MatchFailure::NoCandidates),
    }
}

/// Turns a winning candidate into a result under `policy`.
///
/// A low-confidence winner is returned flagged under
/// [`BelowThresholdPolicy::ReturnAnyway`] and rejected with
/// [`MatchFailure::BelowThreshold`] under [`BelowThresholdPolicy::Fail`].
#[must_use]
pub fn apply_policy(
    best: ScoredCandidate,
    low_confidence: bool,
    policy: &SelectionPolicy,
) -> MatchResult {
    if !low_confidence {
        return MatchResult::found(best, false);
    }
    match policy.on_below_threshold {
        BelowThresholdPolicy::ReturnAnyway => MatchResult::found(best, true),
        BelowThresholdPolicy::Fail => MatchResult::failure(MatchFailure::BelowThreshold {
            best_score: best.combined_score,
            min_similarity: policy.min_similarity,
        }),
    }
}
