use serde_json::Value;
use xmatch_core::{Marketplace, RawCandidate};

use super::jsonld::{extract_json_ld, json_count, json_number, json_rating};
use super::{run_strategies, CandidateExtractor, ExtractionReport, Strategy, StrategyOutcome};
use crate::fetch::{resolve_link, Page};
use crate::html::{attr_in_tag, decode_entities, inner_text_after, script_by_id, split_blocks};
use crate::price::parse_price;

/// Search-results adapter for walmart.com.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalmartExtractor;

impl CandidateExtractor for WalmartExtractor {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Walmart
    }

    fn extract_report(&self, page: &Page) -> ExtractionReport {
        const STRATEGIES: [(&str, Strategy); 3] = [
            ("next-data", extract_next_data),
            ("item-tiles", extract_item_tiles),
            ("json-ld", extract_json_ld),
        ];
        run_strategies(Marketplace::Walmart, page, &STRATEGIES)
    }
}

// ---------------------------------------------------------------------------
// __NEXT_DATA__ payload
// ---------------------------------------------------------------------------

fn extract_next_data(page: &Page) -> StrategyOutcome {
    let Some(body) = script_by_id(&page.html, "__NEXT_DATA__") else {
        return StrategyOutcome::default();
    };
    let data: Value = match serde_json::from_str(body) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "walmart __NEXT_DATA__ is not valid json");
            return StrategyOutcome::default();
        }
    };

    let stacks = data
        .pointer("/props/pageProps/initialData/searchResult/itemStacks")
        .or_else(|| find_key(&data, "itemStacks"));
    let items: Vec<&Value> = stacks
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|stack| stack.get("items").and_then(Value::as_array))
        .flatten()
        // Stacks interleave ad modules and tiles; only Product entries are listings.
        .filter(|item| {
            item.get("__typename")
                .and_then(Value::as_str)
                .is_none_or(|t| t == "Product")
        })
        .collect();

    StrategyOutcome {
        listings_seen: items.len(),
        candidates: items
            .into_iter()
            .filter_map(|item| next_data_item(item, &page.url))
            .collect(),
    }
}

/// Depth-first search for the first object property named `key`.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

fn next_data_item(item: &Value, page_url: &str) -> Option<RawCandidate> {
    let title = item
        .get("name")
        .and_then(Value::as_str)
        .map(|s| decode_entities(s.trim()))
        .filter(|s| !s.is_empty())?;

    let price_info = item.get("priceInfo");
    let price = price_info
        .and_then(|p| p.get("linePrice"))
        .and_then(json_number)
        .or_else(|| {
            price_info
                .and_then(|p| p.pointer("/currentPrice/price"))
                .and_then(json_number)
        })
        .or_else(|| item.get("price").and_then(json_number))?;

    let url = item
        .get("canonicalUrl")
        .and_then(Value::as_str)
        .and_then(|href| resolve_link(href, page_url))
        .unwrap_or_default();

    let image_url = item
        .pointer("/imageInfo/thumbnailUrl")
        .or_else(|| item.get("image"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    Some(RawCandidate {
        title,
        price: Some(price),
        url,
        image_url,
        ratings_average: item.get("averageRating").and_then(json_rating),
        ratings_count: item.get("numberOfReviews").and_then(json_count),
        brand: item
            .get("brand")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_owned),
        sponsored: item
            .get("isSponsoredFlag")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

// ---------------------------------------------------------------------------
// Rendered item tiles
// ---------------------------------------------------------------------------

fn extract_item_tiles(page: &Page) -> StrategyOutcome {
    let blocks = split_blocks(&page.html, "data-item-id=");
    let candidates = blocks
        .iter()
        .filter_map(|block| item_tile(block, &page.url))
        .collect();
    StrategyOutcome {
        listings_seen: blocks.len(),
        candidates,
    }
}

fn item_tile(block: &str, page_url: &str) -> Option<RawCandidate> {
    let title = inner_text_after(block, r#"data-automation-id="product-title""#)?;

    let price = inner_text_after(block, r#"data-automation-id="product-price""#)
        .and_then(|text| {
            // The price module repeats the amount in a screen-reader span.
            match text.to_ascii_lowercase().find("current price") {
                Some(pos) => parse_price(&text[pos..]),
                None => parse_price(&text),
            }
        })
        .or_else(|| {
            let lower = block.to_ascii_lowercase();
            let pos = lower.find("current price")?;
            parse_price(&block[pos..])
        })?;

    let url = attr_in_tag(block, r#"a\s[^>]*href="[^"]*/ip/"#, "href")
        .and_then(|href| resolve_link(&href, page_url))
        .unwrap_or_default();

    let lower = block.to_ascii_lowercase();
    Some(RawCandidate {
        title,
        price: Some(price),
        url,
        image_url: attr_in_tag(block, r#"img[^>]*data-testid="productTileImage""#, "src"),
        sponsored: lower.contains(">sponsored<") || lower.contains("/sp/track"),
        ..RawCandidate::default()
    })
}
