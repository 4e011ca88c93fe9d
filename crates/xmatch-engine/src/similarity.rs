//! Title and brand similarity scoring.
//!
//! All scores are in `[0, 1]`. Empty or absent inputs score `0` rather than
//! erroring, so a malformed candidate simply ranks last.

use xmatch_core::{RawCandidate, ScoredCandidate, SourceProduct};

pub const TITLE_WEIGHT: f64 = 0.7;
pub const BRAND_WEIGHT: f64 = 0.3;

const EXACT_TOKEN_WEIGHT: f64 = 1.0;
const CONTAINED_TOKEN_WEIGHT: f64 = 0.8;
const FUZZY_TOKEN_WEIGHT: f64 = 0.6;
const FUZZY_TOKEN_THRESHOLD: f64 = 0.8;
const MIN_TOKEN_LEN: usize = 3;

const LEADING_PAIR_BONUS: f64 = 0.3;
const LEADING_TOKEN_BONUS: f64 = 0.2;
const LEADING_CONTAINED_BONUS: f64 = 0.1;

/// Lowercases, replaces every non-alphanumeric character with a space, and
/// collapses runs of whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-overlap similarity between two titles.
///
/// Tokens shorter than three characters are ignored. Each token of `a` is
/// weighted by its best relation to `b`: an exact match (each token of `b`
/// consumed at most once), containment in either direction, or a close
/// character-bigram overlap. The weighted count is divided by the larger
/// token count.
#[must_use]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let tokens_a = significant_tokens(&a);
    let tokens_b = significant_tokens(&b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let mut consumed = vec![false; tokens_b.len()];
    let mut weighted = 0.0;
    for token in &tokens_a {
        let exact = tokens_b
            .iter()
            .enumerate()
            .position(|(i, other)| !consumed[i] && other == token);
        if let Some(i) = exact {
            consumed[i] = true;
            weighted += EXACT_TOKEN_WEIGHT;
        } else if tokens_b
            .iter()
            .any(|other| other.contains(token) || token.contains(other))
        {
            weighted += CONTAINED_TOKEN_WEIGHT;
        } else if tokens_b
            .iter()
            .any(|other| bigram_dice(token, other) > FUZZY_TOKEN_THRESHOLD)
        {
            weighted += FUZZY_TOKEN_WEIGHT;
        }
    }

    let denominator = tokens_a.len().max(tokens_b.len());
    clamp_unit(weighted / count_as_f64(denominator))
}

/// Similarity between two brand names.
///
/// Exact (normalized) match is `1`; one containing the other scores `0.8`
/// scaled by the length ratio; otherwise the normalized Levenshtein
/// similarity.
#[must_use]
pub fn brand_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let longer = len_a.max(len_b);
    if a.contains(&b) || b.contains(&a) {
        let shorter = len_a.min(len_b);
        return clamp_unit(0.8 * count_as_f64(shorter) / count_as_f64(longer));
    }

    let distance = levenshtein(&a, &b);
    clamp_unit(1.0 - count_as_f64(distance) / count_as_f64(longer))
}

/// Scores `candidate` against `source`.
///
/// When both sides have a brand: `0.7 * title + 0.3 * brand`. The candidate's
/// brand is the adapter's hint, or the source brand when it appears as a
/// whole-token run in the candidate title. Otherwise: title similarity plus a
/// small bonus for matching leading tokens, capped at `1`.
#[must_use]
pub fn score_candidate(source: &SourceProduct, candidate: &RawCandidate) -> ScoredCandidate {
    let title = title_similarity(&source.title, &candidate.title);

    let brands = source
        .brand_str()
        .and_then(|source_brand| Some((source_brand, candidate_brand(source_brand, candidate)?)));

    let (brand, combined) = match brands {
        Some((source_brand, candidate_brand)) => {
            let brand = brand_similarity(source_brand, &candidate_brand);
            (brand, TITLE_WEIGHT * title + BRAND_WEIGHT * brand)
        }
        None => {
            let bonus = leading_token_bonus(&source.title, &candidate.title);
            (0.0, (title + bonus).min(1.0))
        }
    };

    ScoredCandidate {
        candidate: candidate.clone(),
        title_similarity: title,
        brand_similarity: clamp_unit(brand),
        combined_score: clamp_unit(combined),
    }
}

/// Brand to compare against the source brand, or `None` when the candidate
/// has none.
///
/// Prefers the adapter's hint. Otherwise the source brand counts only if it
/// appears as a whole-token run somewhere in the candidate title.
fn candidate_brand(source_brand: &str, candidate: &RawCandidate) -> Option<String> {
    if let Some(hint) = candidate
        .brand
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
    {
        return Some(hint.to_owned());
    }

    let brand_norm = normalize_text(source_brand);
    let brand_tokens: Vec<&str> = brand_norm.split_whitespace().collect();
    if brand_tokens.is_empty() {
        return None;
    }

    let title_norm = normalize_text(&candidate.title);
    let title_tokens: Vec<&str> = title_norm.split_whitespace().collect();
    title_tokens
        .windows(brand_tokens.len())
        .any(|window| window == brand_tokens.as_slice())
        .then_some(brand_norm)
}

fn leading_token_bonus(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let tokens_b: Vec<&str> = b.split_whitespace().collect();
    let (Some(first_a), Some(first_b)) = (tokens_a.first(), tokens_b.first()) else {
        return 0.0;
    };

    if tokens_a.len() >= 2 && tokens_b.len() >= 2 && tokens_a[..2] == tokens_b[..2] {
        LEADING_PAIR_BONUS
    } else if first_a == first_b {
        LEADING_TOKEN_BONUS
    } else if first_a.contains(first_b) || first_b.contains(first_a) {
        LEADING_CONTAINED_BONUS
    } else {
        0.0
    }
}

fn significant_tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Dice coefficient over character bigrams, counted as multisets.
fn bigram_dice(a: &str, b: &str) -> f64 {
    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let pairs_a = bigrams(a);
    let mut pairs_b = bigrams(b);
    if pairs_a.is_empty() || pairs_b.is_empty() {
        return 0.0;
    }

    let total = pairs_a.len() + pairs_b.len();
    let mut shared = 0usize;
    for pair in &pairs_a {
        if let Some(i) = pairs_b.iter().position(|p| p == pair) {
            pairs_b.swap_remove(i);
            shared += 1;
        }
    }
    2.0 * count_as_f64(shared) / count_as_f64(total)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// Token and character counts stay far below 2^52.
#[allow(clippy::cast_precision_loss)]
fn count_as_f64(n: usize) -> f64 {
    n as f64
}

#[cfg(test)]
#[path = "similarity_test.rs"]
mod tests;
