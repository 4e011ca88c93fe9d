use std::sync::LazyLock;

use regex::Regex;
use xmatch_core::{Marketplace, RawCandidate};

use super::jsonld::extract_json_ld;
use super::{run_strategies, CandidateExtractor, ExtractionReport, Strategy, StrategyOutcome};
use crate::fetch::{resolve_link, Page};
use crate::html::{attr_in_tag, element_texts, inner_text_after, split_blocks};
use crate::price::{combine_price_fragments, parse_count, parse_price, parse_rating};

const RESULT_MARKER: &str = r#"data-component-type="s-search-result""#;

const SPONSORED_MARKERS: [&str; 4] = [
    "AdHolder",
    "puis-sponsored-label",
    ">Sponsored<",
    "/sspa/click",
];

static RATINGS_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)aria-label="([0-9][0-9.,]*\s*[km]?)\s+(?:ratings?|reviews?)""#)
        .expect("valid ratings count regex")
});

/// Search-results adapter for amazon.com.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmazonExtractor;

impl CandidateExtractor for AmazonExtractor {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Amazon
    }

    fn extract_report(&self, page: &Page) -> ExtractionReport {
        const STRATEGIES: [(&str, Strategy); 2] = [
            ("search-result-tiles", extract_result_tiles),
            ("json-ld", extract_json_ld),
        ];
        run_strategies(Marketplace::Amazon, page, &STRATEGIES)
    }
}

fn extract_result_tiles(page: &Page) -> StrategyOutcome {
    let blocks = split_blocks(&page.html, RESULT_MARKER);
    let candidates = blocks
        .iter()
        .filter_map(|block| parse_tile(block, &page.url))
        .collect();
    StrategyOutcome {
        listings_seen: blocks.len(),
        candidates,
    }
}

fn parse_tile(block: &str, page_url: &str) -> Option<RawCandidate> {
    // Newer layouts render the brand in its own h2 ahead of the product title.
    let headings = element_texts(block, "h2");
    let title = headings.iter().max_by_key(|h| h.len())?.clone();
    let brand = headings
        .first()
        .filter(|first| headings.len() > 1 && **first != title)
        .cloned();

    let price = tile_price(block)?;

    let url = attr_in_tag(block, r#"a\s[^>]*href="[^"]*/dp/"#, "href")
        .or_else(|| attr_in_tag(block, r#"a\s[^>]*class="[^"]*a-link-normal"#, "href"))
        .and_then(|href| resolve_link(&href, page_url))
        .unwrap_or_default();

    let ratings_count = RATINGS_COUNT_RE
        .captures(block)
        .and_then(|cap| parse_count(&cap[1]))
        .or_else(|| inner_text_after(block, "s-underline-text").and_then(|t| parse_count(&t)));

    Some(RawCandidate {
        title,
        price: Some(price),
        url,
        image_url: attr_in_tag(block, r#"img[^>]*class="[^"]*s-image"#, "src"),
        ratings_average: inner_text_after(block, "a-icon-alt").and_then(|t| parse_rating(&t)),
        ratings_count,
        brand,
        sponsored: SPONSORED_MARKERS.iter().any(|m| block.contains(m)),
    })
}

fn tile_price(block: &str) -> Option<f64> {
    if let Some(whole) = inner_text_after(block, "a-price-whole") {
        let fraction = inner_text_after(block, "a-price-fraction");
        if let Some(price) = combine_price_fragments(&whole, fraction.as_deref()) {
            return Some(price);
        }
    }
    inner_text_after(block, "a-offscreen").and_then(|t| parse_price(&t))
}
