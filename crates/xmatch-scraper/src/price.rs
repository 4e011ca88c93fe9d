//! Price, rating and count parsing for rendered listing text.
//!
//! Search tiles render prices in many shapes: `"$12.99"`, `"$1,299.00"`,
//! `"US $8.50 to US $12.00"`, `"Now $4.97"`, or as separate whole/fraction
//! fragments (`<span>12.</span><span>99</span>`). Everything here returns a
//! single `f64` or `None`.

/// Parses the first price in `text`.
///
/// Thousands separators are dropped, ranges (`"$8.50 to $12.00"`,
/// `"$8.50 - $12.00"`) resolve to their lower bound, and any currency
/// prefix is ignored. Returns `None` when no digits are present.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;

    let mut number = String::new();
    let mut seen_dot = false;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_digit() {
            number.push(b as char);
        } else if b == b',' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            // Thousands separator: only skip when followed by three digits.
            let group_len = bytes[i + 1..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if group_len != 3 {
                break;
            }
        } else if b == b'.' && !seen_dot && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            seen_dot = true;
            number.push('.');
        } else {
            break;
        }
        i += 1;
    }

    number.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Combines separately rendered whole and fractional price fragments.
///
/// `whole` may carry a trailing decimal point or separators (`"1,299."`);
/// `fraction` is the cents digits (`"99"`). A missing or unparseable fraction
/// yields the whole amount.
#[must_use]
pub fn combine_price_fragments(whole: &str, fraction: Option<&str>) -> Option<f64> {
    let whole_digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if whole_digits.is_empty() {
        return None;
    }
    let base = whole_digits.parse::<f64>().ok()?;

    let cents = fraction
        .map(|f| f.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|digits| !digits.is_empty())
        .and_then(|digits| {
            let scale = 10f64.powi(i32::try_from(digits.len()).ok()?);
            digits.parse::<f64>().ok().map(|v| v / scale)
        })
        .unwrap_or(0.0);

    Some(base + cents)
}

/// Parses a star rating such as `"4.5 out of 5 stars"` or `"4.6"`.
/// Values outside `[0, 5]` are rejected.
#[must_use]
pub fn parse_rating(text: &str) -> Option<f64> {
    parse_price(text).filter(|r| (0.0..=5.0).contains(r))
}

/// Parses a review count such as `"1,234 ratings"`, `"(87)"` or `"2.3K"`.
#[must_use]
pub fn parse_count(text: &str) -> Option<u64> {
    let value = parse_price(text)?;
    let lower = text.to_ascii_lowercase();
    let after_number = lower
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == ',' || c == '.');
    let multiplier = match after_number.chars().next() {
        Some('k') => 1_000.0,
        Some('m') => 1_000_000.0,
        _ => 1.0,
    };
    let scaled = (value * multiplier).round();
    if !(0.0..=1e15).contains(&scaled) {
        return None;
    }
    // Bounded above; the cast cannot truncate meaningfully.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(scaled as u64)
}

#[cfg(test)]
#[path = "price_test.rs"]
mod tests;
