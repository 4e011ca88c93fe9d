use serde::{Deserialize, Serialize};

use crate::marketplace::Marketplace;

/// The product the user is currently viewing, used as the reference for a
/// cross-marketplace search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProduct {
    pub title: String,
    /// Brand as shown on the source listing, if the page exposes one.
    #[serde(default)]
    pub brand: Option<String>,
    /// Listing price on the source marketplace.
    #[serde(default)]
    pub price: Option<f64>,
    pub marketplace: Marketplace,
}

impl SourceProduct {
    #[must_use]
    pub fn new(title: impl Into<String>, marketplace: Marketplace) -> Self {
        Self {
            title: title.into(),
            brand: None,
            price: None,
            marketplace,
        }
    }

    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Brand with surrounding whitespace removed; `None` when absent or blank.
    #[must_use]
    pub fn brand_str(&self) -> Option<&str> {
        self.brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }
}

/// One listing scraped from a target marketplace's search-results page.
///
/// Fields mirror what a results tile usually renders. Entries with a blank
/// title, a missing price or a blank url are kept here as-is and dropped by the
/// result selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub title: String,
    pub price: Option<f64>,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ratings_average: Option<f64>,
    #[serde(default)]
    pub ratings_count: Option<u64>,
    /// Brand line rendered next to the title, when the markup has one.
    #[serde(default)]
    pub brand: Option<String>,
    /// Set by adapters that recognise promotional placements. Sponsored
    /// entries are excluded before candidates leave the extractor.
    #[serde(default)]
    pub sponsored: bool,
}

impl RawCandidate {
    #[must_use]
    pub fn new(title: impl Into<String>, price: Option<f64>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when the candidate has everything the selector needs:
    /// a non-blank title and url, and a finite non-negative price.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.url.trim().is_empty()
            && self.price.is_some_and(|p| p.is_finite() && p >= 0.0)
    }
}

/// A [`RawCandidate`] with its similarity scores against the source product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: RawCandidate,
    pub title_similarity: f64,
    pub brand_similarity: f64,
    pub combined_score: f64,
}
