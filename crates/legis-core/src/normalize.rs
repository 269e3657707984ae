//! Raw → canonical mapping. Total: every input yields a structurally valid
//! [`CanonicalLegalFact`], with documented defaults for missing fields.

use chrono::{DateTime, Utc};

use crate::identity::{derive_identity, qualify};
use crate::models::{
    CanonicalLegalFact, CompositeIdentity, IngestionMethod, LegalStatus, RawLegalFact,
};
use crate::util::{SUMMARY_MAX_CHARS, collapse_whitespace, parse_date_lenient, truncate_chars};

pub const PLACEHOLDER_TITLE: &str = "(untitled document)";
pub const PLACEHOLDER_RATIONALE: &str = "No rationale provided by source.";
/// Declared source used when a raw record carries none.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Normalize with the wall clock as ingestion time.
pub fn normalize(method: IngestionMethod, raw: &RawLegalFact) -> CanonicalLegalFact {
    normalize_at(method, raw, Utc::now())
}

/// Normalize with an explicit ingestion time. `now` supplies the created/updated
/// timestamps and the date used when the source date is unreadable.
pub fn normalize_at(
    method: IngestionMethod,
    raw: &RawLegalFact,
    now: DateTime<Utc>,
) -> CanonicalLegalFact {
    let declared = non_blank(Some(raw.source_id.as_str())).unwrap_or_else(|| UNKNOWN_SOURCE.into());
    let derived = derive_identity(&raw.id, method, &declared);

    let date = raw
        .date
        .as_deref()
        .and_then(parse_date_lenient)
        .unwrap_or_else(|| now.date_naive());

    let title = non_blank(raw.title.as_deref()).unwrap_or_else(|| PLACEHOLDER_TITLE.into());
    let description = non_blank(raw.description.as_deref());
    let source_rationale = non_blank(raw.rationale.as_deref());

    let summary = truncate_chars(
        description
            .as_deref()
            .or(source_rationale.as_deref())
            .unwrap_or(&title),
        SUMMARY_MAX_CHARS,
    );
    let rationale = source_rationale
        .or(description)
        .unwrap_or_else(|| PLACEHOLDER_RATIONALE.into());

    let category = raw
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(method.default_category())
        .to_string();

    let status = raw
        .status
        .as_deref()
        .map(LegalStatus::from_raw)
        .unwrap_or_default();

    CanonicalLegalFact {
        identity: CompositeIdentity::new(&derived.source_id, &derived.document_id, date),
        source_id: derived.source_id,
        document_id: derived.document_id,
        ingestion_method: method,
        uri: non_blank(raw.uri.as_deref()),
        title,
        summary,
        date,
        impact: raw.impact.unwrap_or_default(),
        category,
        status,
        rationale,
        source_url: non_blank(raw.url.as_deref()),
        created_at: now,
        updated_at: now,
    }
}

impl CanonicalLegalFact {
    /// Rebuild a raw record that normalizes back to this fact.
    pub fn to_raw(&self) -> RawLegalFact {
        RawLegalFact {
            source_id: self.source_id.clone(),
            id: qualify(self.ingestion_method, &self.source_id, &self.document_id),
            title: Some(self.title.clone()),
            description: Some(self.summary.clone()),
            date: Some(self.date.format("%Y-%m-%d").to_string()),
            impact: Some(self.impact),
            category: Some(self.category.clone()),
            status: Some(self.status.as_str().to_string()),
            rationale: Some(self.rationale.clone()),
            uri: self.uri.clone(),
            url: self.source_url.clone(),
        }
    }

    /// Like [`to_raw`](Self::to_raw), but fields that only hold a
    /// normalization default are left empty.
    pub fn observed_raw(&self) -> RawLegalFact {
        let mut raw = self.to_raw();
        if self.title == PLACEHOLDER_TITLE {
            raw.title = None;
        }
        if self.summary == self.title {
            raw.description = None;
        }
        if self.rationale == PLACEHOLDER_RATIONALE {
            raw.rationale = None;
        }
        if self.status == LegalStatus::Unknown {
            raw.status = None;
        }
        raw
    }
}

impl RawLegalFact {
    /// Fill the fields this record left empty from `other`. Impact only
    /// moves up.
    pub fn fill_missing(mut self, other: RawLegalFact) -> RawLegalFact {
        self.title = self.title.or(other.title);
        self.description = self.description.or(other.description);
        self.rationale = self.rationale.or(other.rationale);
        self.category = self.category.or(other.category);
        self.status = self.status.or(other.status);
        self.uri = self.uri.or(other.uri);
        self.url = self.url.or(other.url);
        if self.impact.is_none_or(|i| other.impact.is_some_and(|o| o > i)) {
            self.impact = other.impact;
        }
        self
    }
}

fn non_blank(text: Option<&str>) -> Option<String> {
    let collapsed = collapse_whitespace(text?);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;
    use chrono::{NaiveDate, TimeZone};

    fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_feed_item_scenario() {
        let mut raw = RawLegalFact::new("gov-mz", "rss-123");
        raw.title = Some("Test".into());
        raw.date = Some("Mon, 15 Jan 2024 10:00:00 GMT".into());

        let fact = normalize_at(IngestionMethod::Feed, &raw, clock());

        assert_eq!(fact.document_id, "rss-123");
        assert_eq!(fact.ingestion_method, IngestionMethod::Feed);
        assert_eq!(fact.impact, Impact::Low);
        assert_eq!(fact.category, "notice");
        assert_eq!(fact.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(fact.identity.as_str(), "gov-mz:rss-123:2024-01-15");
    }

    #[test]
    fn test_empty_record_gets_defaults() {
        let fact = normalize_at(IngestionMethod::StructuredApi, &RawLegalFact::default(), clock());

        assert_eq!(fact.title, PLACEHOLDER_TITLE);
        assert_eq!(fact.rationale, PLACEHOLDER_RATIONALE);
        assert_eq!(fact.summary, PLACEHOLDER_TITLE);
        assert_eq!(fact.date, clock().date_naive());
        assert_eq!(fact.impact, Impact::Low);
        assert_eq!(fact.category, "legal_act");
        assert_eq!(fact.status, LegalStatus::Unknown);
        assert_eq!(fact.source_id, UNKNOWN_SOURCE);
        assert!(!fact.document_id.is_empty());
    }

    #[test]
    fn test_unparseable_date_uses_ingestion_day() {
        let mut raw = RawLegalFact::new("rcl", "scrape-rcl-UD1");
        raw.date = Some("w przygotowaniu".into());
        let fact = normalize_at(IngestionMethod::BrowserScrape, &raw, clock());
        assert_eq!(fact.date, clock().date_naive());
        assert_eq!(fact.category, "draft");
    }

    #[test]
    fn test_summary_truncated_rationale_kept() {
        let long = "słowo ".repeat(200);
        let mut raw = RawLegalFact::new("sejm", "eli-sejm-DU/2024/5");
        raw.description = Some(long.clone());

        let fact = normalize_at(IngestionMethod::StructuredApi, &raw, clock());

        assert!(fact.summary.chars().count() <= SUMMARY_MAX_CHARS);
        assert_eq!(fact.rationale, collapse_whitespace(&long));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut raw = RawLegalFact::new("sejm", "eli-pl-sejm-DU/2024/1");
        raw.title = Some("  Ustawa   o zmianie ustawy ".into());
        raw.description = Some("Opis ".repeat(150));
        raw.rationale = Some("Pełny opis ".repeat(150));
        raw.date = Some("2024-01-01T08:00:00+01:00".into());
        raw.impact = Some(Impact::High);
        raw.status = Some("obowiązujący".into());
        raw.url = Some("https://isap.sejm.gov.pl/x".into());

        for method in IngestionMethod::ALL {
            let first = normalize_at(method, &raw, clock());
            let second = normalize_at(method, &first.to_raw(), clock());
            assert_eq!(first, second, "not idempotent for {method}");
        }
    }

    #[test]
    fn test_normalize_defaults_are_idempotent() {
        let first = normalize_at(IngestionMethod::Feed, &RawLegalFact::new("nfz", ""), clock());
        let second = normalize_at(IngestionMethod::Feed, &first.to_raw(), clock());
        assert_eq!(first, second);
    }

    #[test]
    fn test_observed_raw_drops_defaults() {
        let fact = normalize_at(IngestionMethod::Feed, &RawLegalFact::new("nfz", "rss-9"), clock());
        let observed = fact.observed_raw();
        assert_eq!(observed.title, None);
        assert_eq!(observed.description, None);
        assert_eq!(observed.rationale, None);
        assert_eq!(observed.status, None);

        let mut raw = RawLegalFact::new("sejm", "eli-sejm-DU/2024/1");
        raw.title = Some("Ustawa".into());
        raw.rationale = Some("Pełny opis".into());
        let fact = normalize_at(IngestionMethod::StructuredApi, &raw, clock());
        let observed = fact.observed_raw();
        assert_eq!(observed.title.as_deref(), Some("Ustawa"));
        assert_eq!(observed.rationale.as_deref(), Some("Pełny opis"));
    }

    #[test]
    fn test_fill_missing_keeps_own_fields() {
        let mut listed = RawLegalFact::new("sejm", "eli-sejm-DU/2024/1");
        listed.title = Some("Krótki".into());
        listed.impact = Some(Impact::Medium);

        let mut detail = RawLegalFact::new("sejm", "DU/2024/1");
        detail.title = Some("Pełny tytuł".into());
        detail.description = Some("Szczegóły".into());
        detail.impact = Some(Impact::Low);

        let merged = listed.fill_missing(detail);
        assert_eq!(merged.id, "eli-sejm-DU/2024/1");
        assert_eq!(merged.title.as_deref(), Some("Krótki"));
        assert_eq!(merged.description.as_deref(), Some("Szczegóły"));
        assert_eq!(merged.impact, Some(Impact::Medium));
    }
}
