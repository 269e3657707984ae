use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Wire encoding a source declares (or lets the server negotiate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    LinkedDataJson,
    RdfXml,
    Turtle,
    Auto,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::LinkedDataJson => "linked-data-json",
            Encoding::RdfXml => "rdf-xml",
            Encoding::Turtle => "turtle",
            Encoding::Auto => "auto",
        }
    }

    /// Value for the `Accept` request header.
    pub fn accept_header(&self) -> &'static str {
        match self {
            Encoding::LinkedDataJson => "application/ld+json, application/json;q=0.9",
            Encoding::RdfXml => "application/rdf+xml",
            Encoding::Turtle => "text/turtle",
            Encoding::Auto => {
                "application/ld+json, application/json;q=0.9, application/rdf+xml;q=0.8, text/turtle;q=0.7, */*;q=0.1"
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fact entered the catalog. Each method is served by its own worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IngestionMethod {
    StructuredApi,
    Feed,
    BrowserScrape,
}

impl IngestionMethod {
    pub const ALL: [IngestionMethod; 3] = [
        IngestionMethod::StructuredApi,
        IngestionMethod::Feed,
        IngestionMethod::BrowserScrape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionMethod::StructuredApi => "structured-api",
            IngestionMethod::Feed => "feed",
            IngestionMethod::BrowserScrape => "browser-scrape",
        }
    }

    /// Category assigned when the source gives none.
    pub fn default_category(&self) -> &'static str {
        match self {
            IngestionMethod::StructuredApi => "legal_act",
            IngestionMethod::Feed => "notice",
            IngestionMethod::BrowserScrape => "draft",
        }
    }
}

impl fmt::Display for IngestionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "structured-api" | "api" => Ok(IngestionMethod::StructuredApi),
            "feed" | "rss" => Ok(IngestionMethod::Feed),
            "browser-scrape" | "browser" | "scrape" => Ok(IngestionMethod::BrowserScrape),
            _ => Err(format!("Unknown ingestion method: {}", s)),
        }
    }
}

/// Estimated impact of a legal act. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    #[default]
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            _ => Err(format!("Unknown impact: {}", s)),
        }
    }
}

/// Legal status of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalStatus {
    InForce,
    Repealed,
    Draft,
    #[default]
    Unknown,
}

impl LegalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalStatus::InForce => "in_force",
            LegalStatus::Repealed => "repealed",
            LegalStatus::Draft => "draft",
            LegalStatus::Unknown => "unknown",
        }
    }

    /// Lenient mapping from whatever a source publishes (Polish or English
    /// vocabulary, booleans, ELI in-force codes).
    pub fn from_raw(raw: &str) -> Self {
        let s = raw.trim().to_lowercase();
        match s.as_str() {
            "in_force" | "in-force" | "inforce" | "true" | "yes" | "obowiązujący"
            | "obowiazujacy" | "obowiązuje" | "akt obowiązujący" => LegalStatus::InForce,
            "not_in_force" | "not-in-force" | "false" | "no" | "repealed" | "uchylony"
            | "akt uchylony" | "wygaśnięcie aktu" | "akt jednorazowy" => LegalStatus::Repealed,
            "draft" | "projekt" | "w przygotowaniu" | "w konsultacjach" => LegalStatus::Draft,
            _ if s.ends_with("not_in_force") || s.ends_with("inforce-notinforce") => {
                LegalStatus::Repealed
            }
            _ if s.ends_with("#in_force")
                || s.ends_with("/in_force")
                || s.ends_with("inforce-inforce") =>
            {
                LegalStatus::InForce
            }
            _ if s.starts_with("projekt") => LegalStatus::Draft,
            _ => LegalStatus::Unknown,
        }
    }
}

impl fmt::Display for LegalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_force" => Ok(LegalStatus::InForce),
            "repealed" => Ok(LegalStatus::Repealed),
            "draft" => Ok(LegalStatus::Draft),
            "unknown" => Ok(LegalStatus::Unknown),
            _ => Err(format!("Unknown legal status: {}", s)),
        }
    }
}

/// A configured upstream publication channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub institution: &'static str,
    pub endpoint: &'static str,
    pub encoding: Encoding,
    pub method: IngestionMethod,
    pub active: bool,
    /// Lower ranks are ingested first.
    pub priority: u32,
    pub category: &'static str,
    /// Per-document endpoint; `{id}` is replaced by the document id.
    pub detail_endpoint: Option<&'static str>,
    /// Alternate listing used when the primary page cannot be rendered.
    pub fallback_endpoint: Option<&'static str>,
}

/// Source-native record, produced per fetch cycle and consumed immediately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLegalFact {
    pub source_id: String,
    /// Native id as emitted by the parser (see [`crate::identity`]).
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Best-effort date text: ISO when the parser could read it, source text otherwise.
    pub date: Option<String>,
    pub impact: Option<Impact>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub rationale: Option<String>,
    pub uri: Option<String>,
    pub url: Option<String>,
}

impl RawLegalFact {
    pub fn new(source_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            id: id.into(),
            ..Default::default()
        }
    }
}

/// `<sourceId>:<documentId>:<date>`, the catalog-wide unique key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeIdentity(String);

impl CompositeIdentity {
    pub fn new(source_id: &str, document_id: &str, date: NaiveDate) -> Self {
        Self(format!(
            "{}:{}:{}",
            source_id,
            document_id,
            date.format("%Y-%m-%d")
        ))
    }

    /// Parse a stored identity. Source ids and document ids never contain `:`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let source = parts.next()?;
        let document = parts.next()?;
        let date = parts.next()?;
        if source.is_empty() || document.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        Some(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn source_id(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    pub fn document_id(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for CompositeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalLegalFact {
    pub identity: CompositeIdentity,
    pub source_id: String,
    pub document_id: String,
    pub ingestion_method: IngestionMethod,
    pub uri: Option<String>,
    pub title: String,
    pub summary: String,
    pub date: NaiveDate,
    pub impact: Impact,
    pub category: String,
    pub status: LegalStatus,
    pub rationale: String,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalLegalFact {
    /// True when the fields an update may touch are identical.
    pub fn same_mutable_fields(&self, other: &CanonicalLegalFact) -> bool {
        self.title == other.title
            && self.summary == other.summary
            && self.status == other.status
            && self.rationale == other.rationale
    }
}

/// A fetched, not yet parsed, response body.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    LinkedData(serde_json::Value),
    RdfXml(String),
    Turtle(String),
    Feed(String),
}

impl RawPayload {
    /// Classify a response body by shape: JSON → linked-data, `<rss`/`<feed`
    /// markup → feed, other markup → RDF/XML, anything else → Turtle.
    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
                return RawPayload::LinkedData(value);
            }
        }
        if trimmed.starts_with('<') {
            if looks_like_feed(trimmed) {
                return RawPayload::Feed(trimmed.to_string());
            }
            return RawPayload::RdfXml(trimmed.to_string());
        }
        RawPayload::Turtle(trimmed.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawPayload::LinkedData(_) => "linked-data",
            RawPayload::RdfXml(_) => "rdf-xml",
            RawPayload::Turtle(_) => "turtle",
            RawPayload::Feed(_) => "feed",
        }
    }
}

fn looks_like_feed(markup: &str) -> bool {
    // Only the prologue matters; skip the XML declaration and comments.
    let head: String = markup.chars().take(512).collect::<String>().to_lowercase();
    head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:rdf xmlns=\"http://purl.org/rss/")
}

/// Caller-supplied request refinements merged into a source endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams {
    /// Result cap.
    pub limit: Option<usize>,
    /// Only documents published on or after this date.
    pub since: Option<NaiveDate>,
}

/// What an upsert did to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}
