use super::*;
use xmatch_core::Marketplace;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn source(title: &str, brand: Option<&str>) -> SourceProduct {
    let product = SourceProduct::new(title, Marketplace::Target);
    match brand {
        Some(b) => product.with_brand(b),
        None => product,
    }
}

fn candidate(title: &str) -> RawCandidate {
    RawCandidate::new(title, Some(9.99), "https://example.com/item")
}

// -----------------------------------------------------------------------
// normalize_text
// -----------------------------------------------------------------------

#[test]
fn normalize_text_lowercases_and_collapses() {
    assert_eq!(normalize_text("  Acme's  BLUE-Widget, 10oz!! "), "acme s blue widget 10oz");
}

#[test]
fn normalize_text_empty_input() {
    assert_eq!(normalize_text("!!! ---"), "");
}

// -----------------------------------------------------------------------
// title_similarity
// -----------------------------------------------------------------------

#[test]
fn identical_titles_after_normalization_score_one() {
    assert!(approx(
        title_similarity("Acme Blue Widget, 10oz", "acme blue widget 10OZ"),
        1.0
    ));
}

#[test]
fn disjoint_titles_score_zero() {
    assert!(approx(
        title_similarity("Acme Blue Widget 10oz", "Totally Unrelated Item"),
        0.0
    ));
}

#[test]
fn empty_titles_score_zero() {
    assert!(approx(title_similarity("", "Acme Widget"), 0.0));
    assert!(approx(title_similarity("Acme Widget", "   "), 0.0));
}

#[test]
fn short_tokens_are_ignored() {
    assert!(approx(title_similarity("a b c", "a b c d"), 0.0));
}

#[test]
fn contained_token_weighs_less_than_exact() {
    // acme exact (1.0) + widget inside widgets (0.8), over 2 tokens.
    assert!(approx(title_similarity("Acme Widget", "Acme Widgets"), 0.9));
}

#[test]
fn near_miss_token_gets_fuzzy_weight() {
    // widgets / widgetz share 5 of 6 bigrams: dice 0.833.
    assert!(approx(title_similarity("Acme widgets", "Acme widgetz"), 0.8));
}

#[test]
fn exact_tokens_are_consumed_once() {
    // The second "blue" has no unconsumed partner but is still contained.
    let score = title_similarity("blue blue widget", "blue widget gizmo");
    assert!(approx(score, (1.0 + 0.8 + 1.0) / 3.0));
}

#[test]
fn title_similarity_divides_by_larger_token_count() {
    assert!(approx(
        title_similarity("Red Shoes Size 9", "Nike Red Shoes Size 9"),
        0.75
    ));
}

// -----------------------------------------------------------------------
// brand_similarity
// -----------------------------------------------------------------------

#[test]
fn brand_exact_match_ignores_case_and_punctuation() {
    assert!(approx(brand_similarity("Ben & Jerry's", "ben jerry s"), 1.0));
}

#[test]
fn brand_containment_scales_by_length() {
    assert!(approx(brand_similarity("Acme", "Acme Corp"), 0.8 * 4.0 / 9.0));
}

#[test]
fn brand_falls_back_to_edit_distance() {
    assert!(approx(brand_similarity("Nike", "Nika"), 0.75));
}

#[test]
fn brand_empty_scores_zero() {
    assert!(approx(brand_similarity("", "Acme"), 0.0));
}

#[test]
fn levenshtein_classic_cases() {
    assert_eq!(levenshtein("kitten", "sitting"), 3);
    assert_eq!(levenshtein("", "abc"), 3);
    assert_eq!(levenshtein("same", "same"), 0);
}

// -----------------------------------------------------------------------
// score_candidate
// -----------------------------------------------------------------------

#[test]
fn brand_found_in_candidate_title_adds_brand_weight() {
    let scored = score_candidate(
        &source("Red Shoes Size 9", Some("Nike")),
        &candidate("Nike Red Shoes Size 9"),
    );
    assert!(approx(scored.brand_similarity, 1.0));
    assert!(approx(scored.title_similarity, 0.75));
    assert!(approx(
        scored.combined_score - TITLE_WEIGHT * scored.title_similarity,
        BRAND_WEIGHT * scored.brand_similarity
    ));
    assert!(approx(scored.combined_score, 0.825));
}

#[test]
fn brand_found_mid_title() {
    let scored = score_candidate(
        &source("Widget", Some("Acme")),
        &candidate("Deluxe Acme Widget"),
    );
    assert!(approx(scored.brand_similarity, 1.0));
}

#[test]
fn adapter_brand_hint_takes_priority() {
    let mut hinted = candidate("Blue Widget 10oz");
    hinted.brand = Some("ACME".to_owned());
    let scored = score_candidate(&source("Acme Blue Widget 10oz", Some("Acme")), &hinted);
    assert!(approx(scored.brand_similarity, 1.0));
}

#[test]
fn hinted_brand_mismatch_uses_edit_distance() {
    let mut hinted = candidate("Nika Running Shoes");
    hinted.brand = Some("Nika".to_owned());
    let scored = score_candidate(&source("Running Shoes", Some("Nike")), &hinted);
    assert!(approx(scored.brand_similarity, 0.75));
}

#[test]
fn brandless_candidate_is_scored_on_title_alone() {
    let scored = score_candidate(
        &source("Blue Widget 10oz", Some("Acme")),
        &candidate("Blue Widget 10oz"),
    );
    assert!(approx(scored.title_similarity, 1.0));
    assert!(approx(scored.brand_similarity, 0.0));
    assert!(approx(scored.combined_score, 1.0));
}

#[test]
fn brandless_candidate_gets_leading_token_bonus() {
    // Title 2/3, leading pair "blue widget" matches: +0.3.
    let scored = score_candidate(
        &source("Blue Widget Deluxe", Some("Acme")),
        &candidate("Blue Widget Basic"),
    );
    assert!(approx(scored.combined_score, 2.0 / 3.0 + 0.3));
}

#[test]
fn no_source_brand_uses_leading_token_bonus() {
    let scored = score_candidate(
        &source("Blue Widget Deluxe", None),
        &candidate("Blue Widget Basic"),
    );
    assert!(approx(scored.title_similarity, 2.0 / 3.0));
    assert!(approx(scored.combined_score, 2.0 / 3.0 + 0.3));
    assert!(approx(scored.brand_similarity, 0.0));
}

#[test]
fn no_source_brand_score_is_capped() {
    let scored = score_candidate(&source("Blue Widget", None), &candidate("Blue Widget"));
    assert!(approx(scored.combined_score, 1.0));
}

#[test]
fn combined_score_stays_in_unit_interval() {
    let titles = ["", "   ", "a", "Acme Blue Widget 10oz", "!!!", "Ünïcödé Wïdget"];
    let brands = [None, Some(""), Some("Acme"), Some("Ünïcödé")];
    for source_title in titles {
        for brand in brands {
            for candidate_title in titles {
                let scored = score_candidate(&source(source_title, brand), &candidate(candidate_title));
                for value in [
                    scored.title_similarity,
                    scored.brand_similarity,
                    scored.combined_score,
                ] {
                    assert!(
                        (0.0..=1.0).contains(&value),
                        "{source_title:?}/{brand:?} vs {candidate_title:?} gave {value}"
                    );
                }
            }
        }
    }
}
