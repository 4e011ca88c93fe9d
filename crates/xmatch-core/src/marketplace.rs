use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::outcome::MatchFailure;

/// Online marketplaces a product can be viewed on or searched against.
///
/// Every variant is a valid *source*. Only marketplaces with a search URL
/// convention and a candidate extractor can be used as a *target*; see
/// [`Marketplace::is_searchable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Amazon,
    Walmart,
    Ebay,
    Target,
}

impl Marketplace {
    /// All known marketplaces, in declaration order.
    pub const ALL: [Marketplace; 4] = [
        Marketplace::Amazon,
        Marketplace::Walmart,
        Marketplace::Ebay,
        Marketplace::Target,
    ];

    /// Lowercase identifier used in config keys, logs and CLI arguments.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Marketplace::Amazon => "amazon",
            Marketplace::Walmart => "walmart",
            Marketplace::Ebay => "ebay",
            Marketplace::Target => "target",
        }
    }

    /// Returns `true` when the marketplace can be the target of a search.
    #[must_use]
    pub fn is_searchable(self) -> bool {
        !matches!(self, Marketplace::Target)
    }

    /// Ensures this marketplace can be searched.
    ///
    /// # Errors
    ///
    /// Returns [`MatchFailure::UnsupportedMarketplace`] for source-only
    /// marketplaces.
    pub fn require_searchable(self) -> Result<Self, MatchFailure> {
        if self.is_searchable() {
            Ok(self)
        } else {
            Err(MatchFailure::UnsupportedMarketplace(self.as_str().to_owned()))
        }
    }
}

impl std::fmt::Display for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marketplace {
    type Err = MatchFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(Marketplace::Amazon),
            "walmart" => Ok(Marketplace::Walmart),
            "ebay" => Ok(Marketplace::Ebay),
            "target" => Ok(Marketplace::Target),
            other => Err(MatchFailure::UnsupportedMarketplace(other.to_owned())),
        }
    }
}
