use chrono::{DateTime, NaiveDate, NaiveDateTime};
use scraper::Html;

/// Maximum length of a fact summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Turn a native identifier or URI into a document-id basis.
///
/// Leading scheme+host and surrounding slashes are removed; every character
/// outside `[A-Za-z0-9\-_/]` becomes `-`. Idempotent.
///
/// Example: `"https://api.sejm.gov.pl/eli/acts/DU/2024/1/"` → `"eli/acts/DU/2024/1"`
pub fn sanitize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_host = match trimmed.find("://") {
        Some(pos) => {
            let rest = &trimmed[pos + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "",
            }
        }
        None => trimmed,
    };

    let replaced: String = without_host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/' {
                c
            } else {
                '-'
            }
        })
        .collect();

    replaced.trim_matches('/').to_string()
}

/// Collapse every whitespace run into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max` characters. Strings already within the limit
/// are returned unchanged.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    cut.trim_end().to_string()
}

/// Text content of a feed/HTML snippet.
///
/// Snippets without any element are returned unchanged: their entities were
/// already resolved by the XML or JSON layer and must not be decoded twice.
pub fn strip_markup(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    let root = fragment.root_element();
    let has_elements = root
        .descendants()
        .skip(1)
        .any(|node| node.value().is_element());
    if !has_elements {
        return text.to_string();
    }
    root.text().collect::<Vec<_>>().join(" ")
}

/// Clean free text: strip markup, collapse whitespace. `None` for blank input.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = collapse_whitespace(&strip_markup(text));
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Best-effort calendar date from the shapes government sources publish.
///
/// Accepts ISO dates, ISO/RFC 3339 datetimes, RFC 2822 (feeds) and
/// `DD.MM.YYYY` / `DD-MM-YYYY` / `YYYY/MM/DD`.
pub fn parse_date_lenient(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in ["%d.%m.%Y", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    // "2024-01-01T10:00:00+0100" and other near-ISO datetimes.
    if s.len() >= 10 && s.is_char_boundary(10) {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }

    None
}
