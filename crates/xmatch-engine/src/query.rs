//! Search URL construction for target marketplaces.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use xmatch_core::{Marketplace, MarketplaceEndpoints, MatchFailure, SearchOptions, SourceProduct};

/// Characters left unescaped in a query value (RFC 3986 unreserved set).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query-string keys used by the supported marketplaces.
const QUERY_KEYS: [&str; 3] = ["k", "q", "_nkw"];

/// Builds the search-results URL for `source` on `target`.
///
/// The title is stripped of punctuation and truncated to
/// `options.max_title_words` tokens. When `options.include_brand` is set and
/// the source has a brand the title does not already start with, the brand is
/// prepended.
///
/// # Errors
///
/// Returns [`MatchFailure::UnsupportedMarketplace`] when `target` has no
/// search adapter.
pub fn build_search_url(
    source: &SourceProduct,
    target: Marketplace,
    options: &SearchOptions,
    endpoints: &MarketplaceEndpoints,
) -> Result<String, MatchFailure> {
    let target = target.require_searchable()?;
    let base = endpoints
        .base_url(target)
        .ok_or_else(|| MatchFailure::UnsupportedMarketplace(target.to_string()))?;

    let query = search_terms(source, options).join(" ");
    let encoded = utf8_percent_encode(&query, QUERY_VALUE);

    let url = match target {
        Marketplace::Amazon => format!("{base}/s?k={encoded}"),
        Marketplace::Walmart => format!("{base}/search?q={encoded}"),
        Marketplace::Ebay => format!("{base}/sch/i.html?_nkw={encoded}"),
        Marketplace::Target => {
            return Err(MatchFailure::UnsupportedMarketplace(target.to_string()));
        }
    };
    Ok(url)
}

/// The ordered search tokens for `source`, before encoding.
#[must_use]
pub fn search_terms(source: &SourceProduct, options: &SearchOptions) -> Vec<String> {
    let mut terms: Vec<String> = strip_punctuation(&source.title)
        .split_whitespace()
        .take(options.max_title_words)
        .map(str::to_owned)
        .collect();

    if !options.include_brand {
        return terms;
    }
    let Some(brand) = source.brand_str() else {
        return terms;
    };

    let brand = strip_punctuation(brand);
    let brand_tokens: Vec<&str> = brand.split_whitespace().collect();
    if brand_tokens.is_empty() {
        return terms;
    }

    let already_leads = terms.len() >= brand_tokens.len()
        && terms
            .iter()
            .zip(&brand_tokens)
            .all(|(term, brand)| term.to_lowercase() == brand.to_lowercase());
    if !already_leads {
        let mut with_brand: Vec<String> = brand_tokens.iter().map(|t| (*t).to_owned()).collect();
        with_brand.append(&mut terms);
        terms = with_brand;
    }
    terms
}

/// Decodes the search terms back out of a URL produced by
/// [`build_search_url`]. Returns an empty list when no known query key is
/// present.
#[must_use]
pub fn parse_query_terms(url: &str) -> Vec<String> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or_default();

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| QUERY_KEYS.contains(key))
        .map(|(_, value)| {
            let spaced = value.replace('+', " ");
            percent_decode_str(&spaced)
                .decode_utf8_lossy()
                .split_whitespace()
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn strip_punctuation(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}
