//! Structured-data fallback shared by every marketplace adapter.
//!
//! Walks `<script type="application/ld+json">` bodies looking for
//! schema.org `Product` nodes, either at the top level, inside an
//! `ItemList`'s `itemListElement[].item`, or inside an `@graph` container.

use serde_json::Value;
use xmatch_core::RawCandidate;

use super::StrategyOutcome;
use crate::fetch::{resolve_link, Page};
use crate::html::{decode_entities, json_ld_scripts};
use crate::price::{parse_count, parse_price, parse_rating};

pub(crate) fn extract_json_ld(page: &Page) -> StrategyOutcome {
    let documents: Vec<Value> = json_ld_scripts(&page.html)
        .into_iter()
        .filter_map(|body| match serde_json::from_str::<Value>(body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed json-ld block");
                None
            }
        })
        .collect();

    let mut products = Vec::new();
    for document in &documents {
        collect_products(document, &mut products);
    }

    let listings_seen = products.len();
    let candidates = products
        .into_iter()
        .filter_map(|node| product_to_candidate(node, &page.url))
        .collect();

    StrategyOutcome {
        listings_seen,
        candidates,
    }
}

fn collect_products<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_products(item, out);
            }
        }
        Value::Object(map) => {
            if has_type(value, "Product") {
                out.push(value);
                return;
            }
            if let Some(graph) = map.get("@graph") {
                collect_products(graph, out);
            }
            if has_type(value, "ItemList") {
                if let Some(Value::Array(elements)) = map.get("itemListElement") {
                    for element in elements {
                        // ListItem wraps the product under `item`; some pages
                        // inline the Product directly.
                        collect_products(element.get("item").unwrap_or(element), out);
                    }
                }
            }
        }
        _ => {}
    }
}

fn has_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn product_to_candidate(node: &Value, page_url: &str) -> Option<RawCandidate> {
    let title = node
        .get("name")
        .and_then(Value::as_str)
        .map(|s| decode_entities(s.trim()))
        .filter(|s| !s.is_empty())?;

    let offers = node.get("offers").map(|o| match o {
        Value::Array(list) => list.first().unwrap_or(o),
        _ => o,
    });
    let price = offers.and_then(|o| {
        o.get("price")
            .or_else(|| o.get("lowPrice"))
            .and_then(json_number)
    })?;

    let url = node
        .get("url")
        .or_else(|| offers.and_then(|o| o.get("url")))
        .and_then(Value::as_str)
        .and_then(|href| resolve_link(href, page_url))
        .unwrap_or_default();

    let image_url = match node.get("image") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(list)) => list.first().and_then(Value::as_str).map(str::to_owned),
        Some(obj @ Value::Object(_)) => obj.get("url").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    };

    let rating = node.get("aggregateRating");
    let brand = match node.get("brand") {
        Some(Value::String(s)) => Some(s.trim().to_owned()),
        Some(obj @ Value::Object(_)) => obj
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_owned()),
        _ => None,
    }
    .filter(|b| !b.is_empty());

    Some(RawCandidate {
        title,
        price: Some(price),
        url,
        image_url,
        ratings_average: rating
            .and_then(|r| r.get("ratingValue"))
            .and_then(json_rating),
        ratings_count: rating
            .and_then(|r| r.get("reviewCount").or_else(|| r.get("ratingCount")))
            .and_then(json_count),
        brand,
        sponsored: false,
    })
}

/// Reads a price-like number that may be encoded as a JSON number or string.
pub(crate) fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

pub(crate) fn json_rating(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => parse_rating(s),
        other => json_number(other).filter(|r| (0.0..=5.0).contains(r)),
    }
}

pub(crate) fn json_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}
