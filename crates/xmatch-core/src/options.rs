use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.3;
pub const DEFAULT_INCLUDE_BRAND: bool = true;
pub const DEFAULT_MAX_TITLE_WORDS: usize = 10;

/// What the selector does when the best candidate scores below
/// `min_similarity`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BelowThresholdPolicy {
    /// Return the weak match, flagged as low confidence.
    #[default]
    ReturnAnyway,
    /// Treat the request as failed.
    Fail,
}

impl std::str::FromStr for BelowThresholdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "return_anyway" | "returnanyway" | "return-anyway" => Ok(Self::ReturnAnyway),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "unknown below-threshold policy '{other}'; expected 'return_anyway' or 'fail'"
            )),
        }
    }
}

/// Per-request tuning for a match search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub timeout_ms: u64,
    pub min_similarity: f64,
    pub include_brand: bool,
    pub max_title_words: usize,
    pub on_below_threshold: BelowThresholdPolicy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            include_brand: DEFAULT_INCLUDE_BRAND,
            max_title_words: DEFAULT_MAX_TITLE_WORDS,
            on_below_threshold: BelowThresholdPolicy::default(),
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    #[must_use]
    pub fn with_include_brand(mut self, include_brand: bool) -> Self {
        self.include_brand = include_brand;
        self
    }

    #[must_use]
    pub fn with_max_title_words(mut self, max_title_words: usize) -> Self {
        self.max_title_words = max_title_words;
        self
    }

    #[must_use]
    pub fn with_below_threshold(mut self, policy: BelowThresholdPolicy) -> Self {
        self.on_below_threshold = policy;
        self
    }
}
