//! Candidate extraction from rendered search-results pages.
//!
//! Each target marketplace has one adapter implementing
//! [`CandidateExtractor`]. Adapters try their structural strategies in
//! priority order and return the first one that yields candidates; sponsored
//! entries are dropped before anything leaves the extractor.

mod amazon;
mod ebay;
mod jsonld;
mod walmart;

use serde::Serialize;
use xmatch_core::{Marketplace, RawCandidate};

use crate::error::ScraperError;
use crate::fetch::Page;

pub use amazon::AmazonExtractor;
pub use ebay::EbayExtractor;
pub use walmart::WalmartExtractor;

/// How an extraction attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// At least one usable candidate was extracted.
    Found,
    /// No strategy recognised any listing elements on the page.
    NoListings,
    /// Listing elements were present but none had a parseable title and price
    /// (or all of them were sponsored).
    Unparseable,
}

/// Result of running an extractor over one page.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub marketplace: Marketplace,
    pub status: ExtractionStatus,
    /// Name of the strategy that produced `candidates`, if any did.
    pub strategy: Option<&'static str>,
    /// Listing elements recognised across all strategies tried.
    pub listings_seen: usize,
    pub sponsored_skipped: usize,
    pub candidates: Vec<RawCandidate>,
}

/// Per-marketplace candidate extraction.
pub trait CandidateExtractor: Send + Sync {
    fn marketplace(&self) -> Marketplace;

    /// Runs every strategy as needed and reports what was found.
    fn extract_report(&self, page: &Page) -> ExtractionReport;

    /// Extracts usable candidates, discarding the diagnostics.
    fn extract(&self, page: &Page) -> Vec<RawCandidate> {
        self.extract_report(page).candidates
    }
}

/// Returns the extractor for `marketplace`.
///
/// # Errors
///
/// Returns [`ScraperError::UnsupportedMarketplace`] for marketplaces without a
/// search adapter.
pub fn extractor_for(marketplace: Marketplace) -> Result<Box<dyn CandidateExtractor>, ScraperError> {
    match marketplace {
        Marketplace::Amazon => Ok(Box::new(AmazonExtractor)),
        Marketplace::Walmart => Ok(Box::new(WalmartExtractor)),
        Marketplace::Ebay => Ok(Box::new(EbayExtractor)),
        Marketplace::Target => Err(ScraperError::UnsupportedMarketplace(marketplace)),
    }
}

/// What a single strategy saw on the page.
#[derive(Debug, Default)]
pub(crate) struct StrategyOutcome {
    /// Listing elements this strategy recognised, parseable or not.
    pub listings_seen: usize,
    /// Candidates with at least a title and a price. May include sponsored
    /// entries; they are filtered by [`run_strategies`].
    pub candidates: Vec<RawCandidate>,
}

pub(crate) type Strategy = fn(&Page) -> StrategyOutcome;

/// Runs `strategies` in order and reports the first that yields a
/// non-sponsored candidate.
pub(crate) fn run_strategies(
    marketplace: Marketplace,
    page: &Page,
    strategies: &[(&'static str, Strategy)],
) -> ExtractionReport {
    let mut listings_seen = 0usize;
    let mut sponsored_skipped = 0usize;

    for &(name, strategy) in strategies {
        let outcome = strategy(page);
        listings_seen += outcome.listings_seen;

        let total = outcome.candidates.len();
        let candidates: Vec<RawCandidate> = outcome
            .candidates
            .into_iter()
            .filter(|c| !c.sponsored)
            .collect();
        sponsored_skipped += total - candidates.len();

        tracing::debug!(
            %marketplace,
            strategy = name,
            listings = outcome.listings_seen,
            parsed = total,
            kept = candidates.len(),
            "extraction strategy finished"
        );

        if !candidates.is_empty() {
            return ExtractionReport {
                marketplace,
                status: ExtractionStatus::Found,
                strategy: Some(name),
                listings_seen,
                sponsored_skipped,
                candidates,
            };
        }
    }

    let status = if listings_seen == 0 {
        tracing::info!(%marketplace, url = %page.url, "no listing elements found on search page");
        ExtractionStatus::NoListings
    } else {
        tracing::info!(
            %marketplace,
            url = %page.url,
            listings_seen,
            sponsored_skipped,
            "listing elements found but none were usable"
        );
        ExtractionStatus::Unparseable
    };

    ExtractionReport {
        marketplace,
        status,
        strategy: None,
        listings_seen,
        sponsored_skipped,
        candidates: Vec::new(),
    }
}
