use std::sync::LazyLock;

use regex::Regex;
use xmatch_core::{Marketplace, RawCandidate};

use super::jsonld::extract_json_ld;
use super::{run_strategies, CandidateExtractor, ExtractionReport, Strategy, StrategyOutcome};
use crate::fetch::{resolve_link, Page};
use crate::html::{attr_in_tag, inner_text_after, split_blocks_at};
use crate::price::{parse_count, parse_price, parse_rating};

// Matches the `s-item` class token exactly, not `s-item__title` and friends.
static S_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<li[^>]*class="(?:[^"]*\s)?s-item(?:\s[^"]*)?""#).expect("valid regex")
});
static S_CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<li[^>]*class="(?:[^"]*\s)?s-card(?:\s[^"]*)?""#).expect("valid regex")
});

const PLACEHOLDER_TITLE: &str = "shop on ebay";

/// Search-results adapter for ebay.com.
#[derive(Debug, Clone, Copy, Default)]
pub struct EbayExtractor;

impl CandidateExtractor for EbayExtractor {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Ebay
    }

    fn extract_report(&self, page: &Page) -> ExtractionReport {
        const STRATEGIES: [(&str, Strategy); 3] = [
            ("s-item", extract_s_items),
            ("s-card", extract_s_cards),
            ("json-ld", extract_json_ld),
        ];
        run_strategies(Marketplace::Ebay, page, &STRATEGIES)
    }
}

fn extract_s_items(page: &Page) -> StrategyOutcome {
    extract_tiles(page, &S_ITEM_RE, "s-item__")
}

fn extract_s_cards(page: &Page) -> StrategyOutcome {
    extract_tiles(page, &S_CARD_RE, "s-card__")
}

fn extract_tiles(page: &Page, tile_re: &Regex, prefix: &str) -> StrategyOutcome {
    let blocks: Vec<&str> = split_blocks_at(&page.html, tile_re)
        .into_iter()
        .filter(|block| !is_placeholder(block, prefix))
        .collect();
    let candidates = blocks
        .iter()
        .filter_map(|block| parse_tile(block, prefix, &page.url))
        .collect();
    StrategyOutcome {
        listings_seen: blocks.len(),
        candidates,
    }
}

/// The first tile on most result pages is a hidden "Shop on eBay" template.
fn is_placeholder(block: &str, prefix: &str) -> bool {
    inner_text_after(block, &format!("{prefix}title"))
        .is_some_and(|t| t.to_ascii_lowercase() == PLACEHOLDER_TITLE)
}

fn parse_tile(block: &str, prefix: &str, page_url: &str) -> Option<RawCandidate> {
    let raw_title = inner_text_after(block, &format!("{prefix}title"))?;
    let title = strip_new_listing(&raw_title);
    if title.is_empty() {
        return None;
    }

    let price = inner_text_after(block, &format!("{prefix}price")).and_then(|t| parse_price(&t))?;

    let url = attr_in_tag(block, &format!(r#"a[^>]*class="[^"]*{prefix}link"#), "href")
        .or_else(|| attr_in_tag(block, r#"a\s[^>]*href="[^"]*/itm/"#, "href"))
        .and_then(|href| resolve_link(&href, page_url))
        .unwrap_or_default();

    let image_url = attr_in_tag(block, &format!(r#"img[^>]*class="[^"]*{prefix}image"#), "src")
        .or_else(|| attr_in_tag(block, "img", "src"));

    Some(RawCandidate {
        title,
        price: Some(price),
        url,
        image_url,
        ratings_average: inner_text_after(block, "x-star-rating")
            .or_else(|| inner_text_after(block, "clipped"))
            .and_then(|t| parse_rating(&t)),
        ratings_count: inner_text_after(block, &format!("{prefix}reviews-count"))
            .and_then(|t| parse_count(&t)),
        brand: None,
        sponsored: block.to_ascii_lowercase().contains(">sponsored<"),
    })
}

fn strip_new_listing(title: &str) -> String {
    let trimmed = title.trim();
    let lower = trimmed.to_ascii_lowercase();
    lower
        .strip_prefix("new listing")
        .map_or(trimmed, |_| trimmed["new listing".len()..].trim_start())
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionStatus;

    const RESULTS: &str = r#"
<ul class="srp-results">
  <li class="s-item s-item__pl-on-bottom" data-view="mi:1686|iid:1">
    <div class="s-item__title"><span role="heading">Shop on eBay</span></div>
    <span class="s-item__price">$20.00</span>
  </li>
  <li class="s-item s-item__pl-on-bottom" data-view="mi:1686|iid:2">
    <div class="s-item__image-wrapper"><img class="s-item__image-img" src="https://i.ebayimg.com/images/g/a.jpg"></div>
    <a class="s-item__link" href="https://www.ebay.com/itm/1234567890?hash=item1">
      <div class="s-item__title"><span role="heading"><span class="LIGHT_HIGHLIGHT">New Listing</span>Acme Blue Widget 10oz</span></div>
    </a>
    <div class="x-star-rating"><span class="clipped">4.5 out of 5 stars.</span></div>
    <span class="s-item__reviews-count"><span>(87)</span></span>
    <span class="s-item__price">$9.50 to $12.00</span>
  </li>
  <li class="s-item s-item__pl-on-bottom" data-view="mi:1686|iid:3">
    <a class="s-item__link" href="https://www.ebay.com/itm/999"><div class="s-item__title"><span>Promoted Widget</span></div></a>
    <span class="s-item__price">$7.00</span>
    <span>Sponsored</span>
  </li>
</ul>"#;

    fn page(html: &str) -> Page {
        Page::new("https://www.ebay.com/sch/i.html?_nkw=acme+widget", html)
    }

    #[test]
    fn extracts_items_and_skips_placeholder_and_sponsored() {
        let report = EbayExtractor.extract_report(&page(RESULTS));
        assert_eq!(report.status, ExtractionStatus::Found);
        assert_eq!(report.strategy, Some("s-item"));
        assert_eq!(report.listings_seen, 2);
        assert_eq!(report.sponsored_skipped, 1);
        assert_eq!(report.candidates.len(), 1);

        let c = &report.candidates[0];
        assert_eq!(c.title, "Acme Blue Widget 10oz");
        assert_eq!(c.price, Some(9.5));
        assert_eq!(c.url, "https://www.ebay.com/itm/1234567890?hash=item1");
        assert_eq!(
            c.image_url.as_deref(),
            Some("https://i.ebayimg.com/images/g/a.jpg")
        );
        assert_eq!(c.ratings_average, Some(4.5));
        assert_eq!(c.ratings_count, Some(87));
    }

    #[test]
    fn reads_card_layout() {
        let html = r#"
<ul>
  <li class="s-card s-card--horizontal" id="item1">
    <a class="s-card__link" href="/itm/42"><div class="s-card__title"><span>Acme Widget</span></div></a>
    <img class="s-card__image" src="https://i.ebayimg.com/42.jpg">
    <span class="s-card__price">$15.25</span>
  </li>
</ul>"#;
        let report = EbayExtractor.extract_report(&page(html));
        assert_eq!(report.strategy, Some("s-card"));
        let c = &report.candidates[0];
        assert_eq!(c.url, "https://www.ebay.com/itm/42");
        assert_eq!(c.price, Some(15.25));
        assert_eq!(c.image_url.as_deref(), Some("https://i.ebayimg.com/42.jpg"));
    }

    #[test]
    fn placeholder_only_page_has_no_listings() {
        let html = r#"<li class="s-item"><div class="s-item__title">Shop on eBay</div><span class="s-item__price">$1.00</span></li>"#;
        let report = EbayExtractor.extract_report(&page(html));
        assert_eq!(report.status, ExtractionStatus::NoListings);
    }

    #[test]
    fn strip_new_listing_prefix() {
        assert_eq!(strip_new_listing("New Listing Acme Widget"), "Acme Widget");
        assert_eq!(strip_new_listing("NEW LISTINGAcme"), "Acme");
        assert_eq!(strip_new_listing("Acme Widget"), "Acme Widget");
    }
}
