use std::path::PathBuf;

use crate::marketplace::Marketplace;
use crate::options::SearchOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Search-page origins per target marketplace.
///
/// Overridable so tests and staging setups can point the engine at a local
/// server instead of the live storefronts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceEndpoints {
    pub amazon: String,
    pub walmart: String,
    pub ebay: String,
}

impl Default for MarketplaceEndpoints {
    fn default() -> Self {
        Self {
            amazon: "https://www.amazon.com".to_string(),
            walmart: "https://www.walmart.com".to_string(),
            ebay: "https://www.ebay.com".to_string(),
        }
    }
}

impl MarketplaceEndpoints {
    /// Base URL for `marketplace`, without a trailing slash. `None` for
    /// source-only marketplaces.
    #[must_use]
    pub fn base_url(&self, marketplace: Marketplace) -> Option<&str> {
        let base = match marketplace {
            Marketplace::Amazon => &self.amazon,
            Marketplace::Walmart => &self.walmart,
            Marketplace::Ebay => &self.ebay,
            Marketplace::Target => return None,
        };
        Some(base.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Defaults applied to every request that does not pass its own options.
    pub search: SearchOptions,
    /// Delay between the search context starting and the page being scanned.
    pub settle_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    /// When set, handoff state is persisted as one JSON file per request in
    /// this directory instead of being kept in memory.
    pub handoff_path: Option<PathBuf>,
    pub endpoints: MarketplaceEndpoints,
}
