//! Shared domain types and configuration for the xmatch workspace.

pub mod app_config;
pub mod config;
pub mod marketplace;
pub mod options;
pub mod outcome;
pub mod products;

pub use app_config::{AppConfig, Environment, MarketplaceEndpoints};
pub use config::{load_app_config, load_app_config_from_env};
pub use marketplace::Marketplace;
pub use options::{BelowThresholdPolicy, SearchOptions};
pub use outcome::{MatchFailure, MatchResult};
pub use products::{RawCandidate, ScoredCandidate, SourceProduct};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
