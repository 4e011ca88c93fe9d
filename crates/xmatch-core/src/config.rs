use crate::app_config::{AppConfig, Environment, MarketplaceEndpoints};
use crate::options::{BelowThresholdPolicy, SearchOptions};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("'{other}' is not a boolean"))),
        }
    };

    let env = parse_environment(&or_default("XMATCH_ENV", "development"))?;
    let log_level = or_default("XMATCH_LOG_LEVEL", "info");

    let timeout_ms = parse_u64("XMATCH_TIMEOUT_MS", "30000")?;
    if timeout_ms == 0 {
        return Err(invalid("XMATCH_TIMEOUT_MS", "must be greater than zero".into()));
    }

    let min_similarity = or_default("XMATCH_MIN_SIMILARITY", "0.3")
        .parse::<f64>()
        .map_err(|e| invalid("XMATCH_MIN_SIMILARITY", e.to_string()))?;
    if !(0.0..=1.0).contains(&min_similarity) {
        return Err(invalid(
            "XMATCH_MIN_SIMILARITY",
            format!("{min_similarity} is outside [0, 1]"),
        ));
    }

    let include_brand = parse_bool("XMATCH_INCLUDE_BRAND", "true")?;
    let max_title_words = parse_usize("XMATCH_MAX_TITLE_WORDS", "10")?;
    if max_title_words == 0 {
        return Err(invalid(
            "XMATCH_MAX_TITLE_WORDS",
            "must be greater than zero".into(),
        ));
    }

    let on_below_threshold = or_default("XMATCH_BELOW_THRESHOLD", "return_anyway")
        .parse::<BelowThresholdPolicy>()
        .map_err(|reason| invalid("XMATCH_BELOW_THRESHOLD", reason))?;

    let settle_delay_ms = parse_u64("XMATCH_SETTLE_DELAY_MS", "1500")?;
    let request_timeout_secs = parse_u64("XMATCH_REQUEST_TIMEOUT_SECS", "20")?;
    let user_agent = or_default("XMATCH_USER_AGENT", "xmatch/0.1 (listing-matcher)");
    let max_retries = parse_u32("XMATCH_MAX_RETRIES", "2")?;
    let retry_backoff_base_secs = parse_u64("XMATCH_RETRY_BACKOFF_BASE_SECS", "1")?;

    let handoff_path = lookup("XMATCH_HANDOFF_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let defaults = MarketplaceEndpoints::default();
    let endpoints = MarketplaceEndpoints {
        amazon: parse_base_url(&lookup, "XMATCH_AMAZON_BASE_URL", &defaults.amazon)?,
        walmart: parse_base_url(&lookup, "XMATCH_WALMART_BASE_URL", &defaults.walmart)?,
        ebay: parse_base_url(&lookup, "XMATCH_EBAY_BASE_URL", &defaults.ebay)?,
    };

    Ok(AppConfig {
        env,
        log_level,
        search: SearchOptions {
            timeout_ms,
            min_similarity,
            include_brand,
            max_title_words,
            on_below_threshold,
        },
        settle_delay_ms,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_secs,
        handoff_path,
        endpoints,
    })
}

/// Read a base URL override, requiring an `http(s)://` scheme.
fn parse_base_url<F>(lookup: &F, var: &str, default: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("'{raw}' must start with http:// or https://"),
        })
    }
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "XMATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
