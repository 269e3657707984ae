//! Identity derivation: native id → (source id, document id).
//!
//! [`IDENTITY_RULES`] is the only place that knows how native ids are shaped.
//! Rows are tried in order and the first match wins. Historical shapes are
//! rows flagged `legacy` and must derive exactly what the current shape of
//! the same document derives, so reprocessing old records never splits one
//! document into two identities.
//!
//! | rule | method | shape |
//! |---|---|---|
//! | `eli-publisher-v1` | structured-api | `eli-pl-<src>-<doc>` |
//! | `eli` | structured-api | `eli-<src>-<doc>` |
//! | `untagged-v0` | structured-api | `<src>-<doc>`, src ∈ sejm/isap/du/mp |
//! | `scrape` | browser-scrape | `scrape-<src>-<doc>` |
//! | `scrape-underscore-v0` | browser-scrape | `<src>_<doc>`, src ∈ rcl |
//! | `feed-guid` | feed | `<guid>` (source is the declaring feed) |

use crate::models::IngestionMethod;
use crate::util::sanitize_id;

/// Document id used when a raw id sanitizes to nothing.
pub const UNIDENTIFIED_DOCUMENT: &str = "unidentified";

/// How the leading segments of a native id are recognised.
#[derive(Debug, Clone, Copy)]
pub enum SegmentTag {
    /// Leading segments must equal these literals, in order.
    Literal(&'static [&'static str]),
    /// First segment must be one of these.
    OneOf(&'static [&'static str]),
    /// No prefix check.
    Any,
}

/// Where the source id comes from.
#[derive(Debug, Clone, Copy)]
pub enum SourceFrom {
    /// The segment at this index.
    Segment(usize),
    /// The source that declared the record.
    Declared,
}

#[derive(Debug, Clone, Copy)]
pub struct IdentityRule {
    pub name: &'static str,
    pub method: IngestionMethod,
    pub separator: char,
    pub tag: SegmentTag,
    /// Number of leading segments consumed before the document id.
    pub prefix_len: usize,
    pub source: SourceFrom,
    pub legacy: bool,
}

pub const IDENTITY_RULES: &[IdentityRule] = &[
    IdentityRule {
        name: "eli-publisher-v1",
        method: IngestionMethod::StructuredApi,
        separator: '-',
        tag: SegmentTag::Literal(&["eli", "pl"]),
        prefix_len: 3,
        source: SourceFrom::Segment(2),
        legacy: true,
    },
    IdentityRule {
        name: "eli",
        method: IngestionMethod::StructuredApi,
        separator: '-',
        tag: SegmentTag::Literal(&["eli"]),
        prefix_len: 2,
        source: SourceFrom::Segment(1),
        legacy: false,
    },
    IdentityRule {
        name: "untagged-v0",
        method: IngestionMethod::StructuredApi,
        separator: '-',
        tag: SegmentTag::OneOf(&["sejm", "isap", "du", "mp"]),
        prefix_len: 1,
        source: SourceFrom::Segment(0),
        legacy: true,
    },
    IdentityRule {
        name: "scrape",
        method: IngestionMethod::BrowserScrape,
        separator: '-',
        tag: SegmentTag::Literal(&["scrape"]),
        prefix_len: 2,
        source: SourceFrom::Segment(1),
        legacy: false,
    },
    IdentityRule {
        name: "scrape-underscore-v0",
        method: IngestionMethod::BrowserScrape,
        separator: '_',
        tag: SegmentTag::OneOf(&["rcl"]),
        prefix_len: 1,
        source: SourceFrom::Segment(0),
        legacy: true,
    },
    IdentityRule {
        name: "feed-guid",
        method: IngestionMethod::Feed,
        separator: '-',
        tag: SegmentTag::Any,
        prefix_len: 0,
        source: SourceFrom::Declared,
        legacy: false,
    },
];

/// Result of identity derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedId {
    pub source_id: String,
    pub document_id: String,
    /// Name of the rule that matched, `"fallback"` when none did.
    pub rule: &'static str,
}

impl DerivedId {
    /// Same source and document, regardless of which rule produced them.
    pub fn same_document(&self, other: &DerivedId) -> bool {
        self.source_id == other.source_id && self.document_id == other.document_id
    }
}

/// Derive `(source id, document id)` from a native id using [`IDENTITY_RULES`].
pub fn derive_identity(raw_id: &str, method: IngestionMethod, declared_source: &str) -> DerivedId {
    derive_with(IDENTITY_RULES, raw_id, method, declared_source)
}

/// [`derive_identity`] over an explicit rule table.
fn derive_with(
    rules: &[IdentityRule],
    raw_id: &str,
    method: IngestionMethod,
    declared_source: &str,
) -> DerivedId {
    let raw_id = raw_id.trim();
    for rule in rules.iter().filter(|r| r.method == method) {
        if let Some(derived) = apply_rule(rule, raw_id, declared_source) {
            return derived;
        }
    }
    DerivedId {
        source_id: declared_source.to_string(),
        document_id: document_or_placeholder(raw_id),
        rule: "fallback",
    }
}

fn apply_rule(rule: &IdentityRule, raw_id: &str, declared_source: &str) -> Option<DerivedId> {
    let segments: Vec<&str> = raw_id.split(rule.separator).collect();
    if segments.len() <= rule.prefix_len {
        return None;
    }

    let tag_matches = match rule.tag {
        SegmentTag::Literal(literals) => {
            literals.len() <= segments.len()
                && literals.iter().zip(&segments).all(|(lit, seg)| lit == seg)
        }
        SegmentTag::OneOf(allowed) => allowed.contains(&segments[0]),
        SegmentTag::Any => true,
    };
    if !tag_matches {
        return None;
    }

    let source_id = match rule.source {
        SourceFrom::Segment(index) => segments.get(index)?.to_string(),
        SourceFrom::Declared => declared_source.to_string(),
    };
    if source_id.is_empty() {
        return None;
    }

    let separator = rule.separator.to_string();
    let rest = segments[rule.prefix_len..].join(separator.as_str());
    let document_id = sanitize_id(&rest);
    if document_id.is_empty() {
        return None;
    }

    Some(DerivedId {
        source_id,
        document_id,
        rule: rule.name,
    })
}

fn document_or_placeholder(raw_id: &str) -> String {
    let sanitized = sanitize_id(raw_id);
    if sanitized.is_empty() {
        UNIDENTIFIED_DOCUMENT.to_string()
    } else {
        sanitized
    }
}

/// Build the current-shape native id for a document. Inverse of
/// [`derive_identity`] for non-legacy rules.
pub fn qualify(method: IngestionMethod, source_id: &str, document_id: &str) -> String {
    match method {
        IngestionMethod::StructuredApi => format!("eli-{source_id}-{document_id}"),
        IngestionMethod::BrowserScrape => format!("scrape-{source_id}-{document_id}"),
        IngestionMethod::Feed => document_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceRegistry;

    fn api(raw: &str) -> DerivedId {
        derive_identity(raw, IngestionMethod::StructuredApi, "declared")
    }

    fn scrape(raw: &str) -> DerivedId {
        derive_identity(raw, IngestionMethod::BrowserScrape, "declared")
    }

    // -- structured-api family --

    #[test]
    fn test_structured_current_shape() {
        let d = api("eli-sejm-DU/2024/1");
        assert_eq!(d.source_id, "sejm");
        assert_eq!(d.document_id, "DU/2024/1");
        assert_eq!(d.rule, "eli");
    }

    #[test]
    fn test_first_matching_row_wins() {
        let current_only = &IDENTITY_RULES[1..2];
        let d = derive_with(current_only, "eli-pl-sejm-DU/2024/1", IngestionMethod::StructuredApi, "declared");
        assert_eq!(d.rule, "eli");
        assert_eq!(d.source_id, "pl");

        let d = api("eli-pl-sejm-DU/2024/1");
        assert_eq!(d.rule, "eli-publisher-v1");
        assert_eq!(d.source_id, "sejm");
    }

    #[test]
    fn test_structured_document_keeps_inner_separators() {
        let d = api("eli-du-WDU-2024-0000001");
        assert_eq!(d.source_id, "du");
        assert_eq!(d.document_id, "WDU-2024-0000001");
    }

    #[test]
    fn test_structured_publisher_legacy_matches_current() {
        let legacy = api("eli-pl-sejm-DU/2024/1");
        let current = api("eli-sejm-DU/2024/1");
        assert_eq!(legacy.rule, "eli-publisher-v1");
        assert!(legacy.same_document(&current));
    }

    #[test]
    fn test_structured_untagged_legacy_matches_current() {
        for src in ["sejm", "isap", "du", "mp"] {
            let legacy = api(&format!("{src}-DU-2024-17"));
            let current = api(&format!("eli-{src}-DU-2024-17"));
            assert_eq!(legacy.rule, "untagged-v0");
            assert!(legacy.same_document(&current), "diverged for {src}");
        }
    }

    #[test]
    fn test_structured_unknown_shape_falls_back_to_declared_source() {
        let d = api("WDU20240000001");
        assert_eq!(d.rule, "fallback");
        assert_eq!(d.source_id, "declared");
        assert_eq!(d.document_id, "WDU20240000001");
    }

    #[test]
    fn test_structured_prefix_without_document_falls_back() {
        let d = api("eli-sejm");
        assert_eq!(d.rule, "fallback");
        assert_eq!(d.document_id, "eli-sejm");
    }

    // -- browser-scrape family --

    #[test]
    fn test_scrape_current_shape() {
        let d = scrape("scrape-rcl-UD123");
        assert_eq!(d.source_id, "rcl");
        assert_eq!(d.document_id, "UD123");
    }

    #[test]
    fn test_scrape_underscore_legacy_matches_current() {
        let legacy = scrape("rcl_UD123_2024");
        let current = scrape("scrape-rcl-UD123_2024");
        assert_eq!(legacy.rule, "scrape-underscore-v0");
        assert!(legacy.same_document(&current));
    }

    #[test]
    fn test_scrape_fallback_ids_use_same_rule() {
        let d = scrape("scrape-rcl-fallback-3");
        assert_eq!(d.source_id, "rcl");
        assert_eq!(d.document_id, "fallback-3");
    }

    // -- feed family --

    #[test]
    fn test_feed_guid_keeps_declared_source() {
        let d = derive_identity("rss-123", IngestionMethod::Feed, "gov-mz");
        assert_eq!(d.source_id, "gov-mz");
        assert_eq!(d.document_id, "rss-123");
        assert_eq!(d.rule, "feed-guid");
    }

    #[test]
    fn test_feed_url_guid_is_sanitized() {
        let d = derive_identity(
            "https://www.gov.pl/web/zdrowie/komunikat-123?utm=rss",
            IngestionMethod::Feed,
            "gov-mz",
        );
        assert_eq!(d.document_id, "web/zdrowie/komunikat-123-utm-rss");
    }

    #[test]
    fn test_empty_id_gets_placeholder() {
        let d = derive_identity("  ", IngestionMethod::Feed, "gov-mz");
        assert_eq!(d.document_id, UNIDENTIFIED_DOCUMENT);
    }

    // -- table-wide properties --

    #[test]
    fn test_rules_do_not_cross_methods() {
        // A structured-looking id ingested by a feed stays whole.
        let d = derive_identity("eli-sejm-DU/2024/1", IngestionMethod::Feed, "gov-mz");
        assert_eq!(d.source_id, "gov-mz");
        assert_eq!(d.document_id, "eli-sejm-DU/2024/1");
    }

    #[test]
    fn test_qualify_then_derive_is_identity() {
        let cases = [
            (IngestionMethod::StructuredApi, "sejm", "DU/2024/1"),
            (IngestionMethod::StructuredApi, "mp", "MP-2024-55"),
            (IngestionMethod::BrowserScrape, "rcl", "UD123"),
            (IngestionMethod::Feed, "gov-mz", "rss-123"),
        ];
        for (method, source, doc) in cases {
            let d = derive_identity(&qualify(method, source, doc), method, source);
            assert_eq!(d.source_id, source);
            assert_eq!(d.document_id, doc);
            assert!(!IDENTITY_RULES.iter().any(|r| r.name == d.rule && r.legacy));
        }
    }

    #[test]
    fn test_derivation_is_idempotent() {
        for (raw, method) in [
            ("eli-pl-sejm-DU/2024/1", IngestionMethod::StructuredApi),
            ("sejm-DU-2024-1", IngestionMethod::StructuredApi),
            ("rcl_UD9", IngestionMethod::BrowserScrape),
            ("rss-123", IngestionMethod::Feed),
        ] {
            let first = derive_identity(raw, method, "gov-mz");
            let again = derive_identity(
                &qualify(method, &first.source_id, &first.document_id),
                method,
                &first.source_id,
            );
            assert!(first.same_document(&again), "unstable for {raw}");
        }
    }

    #[test]
    fn test_qualified_families_use_single_segment_source_ids() {
        for source in SourceRegistry::builtin().all() {
            if source.method != IngestionMethod::Feed {
                assert!(
                    !source.id.contains('-') && !source.id.contains('_'),
                    "{} would not survive prefix splitting",
                    source.id
                );
            }
        }
    }
}
