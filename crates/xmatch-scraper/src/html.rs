//! Regex-based markup helpers shared by the marketplace adapters.
//!
//! Search pages are scanned as text: listing tiles are located by a marker
//! attribute and sliced out, then individual fields are pulled from each
//! slice. None of these helpers validate HTML structure.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"));
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid regex"));
static JSON_LD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

/// Strips tags, decodes common entities and collapses whitespace.
pub(crate) fn clean_text(input: &str) -> String {
    let no_tags = TAG_RE.replace_all(input, " ");
    decode_entities(&no_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes the handful of HTML entities that show up in listing titles.
pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let decoded = NUMERIC_ENTITY_RE.replace_all(input, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = if let Some(hex) = raw.strip_prefix('x') {
            u32::from_str_radix(hex, 16).ok()
        } else {
            raw.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });

    decoded
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Splits `html` into tiles, each starting at an opening tag that contains
/// `marker`. Text before the first marker is discarded; each tile runs up to
/// the next marker (or the end of the document).
pub(crate) fn split_blocks<'a>(html: &'a str, marker: &str) -> Vec<&'a str> {
    let starts: Vec<usize> = html
        .match_indices(marker)
        .filter_map(|(pos, _)| html[..pos].rfind('<'))
        .collect();

    let mut unique = starts;
    unique.dedup();

    unique
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = unique.get(i + 1).copied().unwrap_or(html.len());
            &html[start..end]
        })
        .collect()
}

/// Splits `html` into tiles, each starting where `tag_re` matches. Used when
/// a plain substring marker would also hit child elements (e.g. a `s-item`
/// class versus `s-item__title`).
pub(crate) fn split_blocks_at<'a>(html: &'a str, tag_re: &Regex) -> Vec<&'a str> {
    let starts: Vec<usize> = tag_re.find_iter(html).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            &html[start..end]
        })
        .collect()
}

/// Returns the cleaned inner text of every `<tag ...>...</tag>` element in
/// `block`, in document order. Empty elements are skipped.
pub(crate) fn element_texts(block: &str, tag: &str) -> Vec<String> {
    let Ok(element_re) = Regex::new(&format!(
        r"(?is)<{tag}(?:\s[^>]*)?>(.*?)</{tag}\s*>",
        tag = regex::escape(tag)
    )) else {
        return Vec::new();
    };
    element_re
        .captures_iter(block)
        .filter_map(|cap| cap.get(1).map(|m| clean_text(m.as_str())))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Returns the value of attribute `name` on the first opening tag in `block`
/// whose own markup matches `tag_pattern` (a regex fragment, e.g.
/// `img[^>]*class="[^"]*s-image`).
pub(crate) fn attr_in_tag(block: &str, tag_pattern: &str, name: &str) -> Option<String> {
    let tag_re = Regex::new(&format!(r"(?is)<{tag_pattern}[^>]*>")).ok()?;
    let tag = tag_re.find(block)?.as_str();
    attr_value(tag, name)
}

/// Reads attribute `name` from a single opening tag.
pub(crate) fn attr_value(tag: &str, name: &str) -> Option<String> {
    let attr_re = Regex::new(&format!(
        r#"(?is)\s{}\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(name)
    ))
    .ok()?;
    let caps = attr_re.captures(tag)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let value = decode_entities(raw.trim());
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Returns the cleaned inner text of the first element in `block` whose
/// opening tag contains `marker`. Nested markup inside the element is kept
/// up to the first closing tag of the same name.
pub(crate) fn inner_text_after(block: &str, marker: &str) -> Option<String> {
    let marker_pos = block.find(marker)?;
    let open_start = block[..marker_pos].rfind('<')?;
    let tag_name: String = block[open_start + 1..]
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect();
    if tag_name.is_empty() {
        return None;
    }

    let open_end = open_start + block[open_start..].find('>')? + 1;
    let close = format!("</{tag_name}");
    let rest = &block[open_end..];
    let inner = rest.find(&close).map_or(rest, |end| &rest[..end]);
    let text = clean_text(inner);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Returns the JSON bodies of every `<script type="application/ld+json">`.
pub(crate) fn json_ld_scripts(html: &str) -> Vec<&str> {
    JSON_LD_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim()))
        .filter(|body| !body.is_empty())
        .collect()
}

/// Returns the body of the `<script id="{id}">` element, if present.
pub(crate) fn script_by_id<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    let script_re = Regex::new(&format!(
        r#"(?is)<script[^>]*\sid\s*=\s*["']{}["'][^>]*>(.*?)</script>"#,
        regex::escape(id)
    ))
    .ok()?;
    script_re
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
}
