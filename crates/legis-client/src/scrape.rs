//! Extraction of legislative listings from script-rendered pages.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use legis_core::classify::classify_impact;
use legis_core::error::AppError;
use legis_core::identity::qualify;
use legis_core::models::{IngestionMethod, RawLegalFact, SourceDescriptor};
use legis_core::traits::{Harvester, PageRenderer};
use legis_core::util::{collapse_whitespace, parse_date_lenient, sanitize_id};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Rows of the portal's data grid.
pub const DATA_GRID_ROWS: &str = ".k-grid-content table tbody tr";
/// Rows of any plain table.
pub const TABLE_ROWS: &str = "table tbody tr";
/// Bound on waiting for rows to appear.
pub const RENDER_WAIT: Duration = Duration::from_secs(15);

/// Links on the fallback page that look like legislative projects.
const PROJECT_LINK_PATTERN: &str = r"(?i)(projekt|legislacyjn|ustaw|rozporz|/docs/)";
const MIN_LINK_TEXT: usize = 12;

/// Harvester for browser-rendered listings.
///
/// Renders the primary listing and reads it row by row. When that fails, or
/// yields nothing, it falls back to the source's alternate page with a looser
/// link heuristic (dated today, sequential ids).
#[derive(Debug, Clone)]
pub struct BrowserExtractor<R: PageRenderer> {
    renderer: R,
    wait: Duration,
}

impl<R: PageRenderer> BrowserExtractor<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            wait: RENDER_WAIT,
        }
    }

    pub async fn scrape(&self, source: &SourceDescriptor) -> Result<Vec<RawLegalFact>, AppError> {
        let primary = match self
            .renderer
            .render(source.endpoint, &[DATA_GRID_ROWS, TABLE_ROWS], self.wait)
            .await
        {
            Ok(html) => {
                let facts = parse_rows(&html, source);
                if !facts.is_empty() {
                    tracing::debug!(source = %source.id, rows = facts.len(), "Parsed rendered listing");
                    return Ok(facts);
                }
                AppError::FormatError(format!("No rows in rendered listing {}", source.endpoint))
            }
            Err(e) => e,
        };

        let Some(fallback) = source.fallback_endpoint else {
            return Err(primary);
        };
        tracing::warn!(
            source = %source.id,
            fault = %primary.fault_class(),
            error = %primary,
            %fallback,
            "Primary listing failed, using fallback page"
        );

        let html = self.renderer.render(fallback, &["a[href]"], self.wait).await?;
        parse_fallback(&html, source, fallback, Utc::now().date_naive())
    }
}

impl<R: PageRenderer> Harvester for BrowserExtractor<R> {
    async fn harvest(&self, source: &SourceDescriptor) -> Result<Vec<RawLegalFact>, AppError> {
        self.scrape(source).await
    }

    async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::Generic(format!("Invalid selector '{css}': {e}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn resolve(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(String::from)
        .ok()
}

/// Rows of the rendered listing. Cells 0..3 are (document number, title, date).
pub fn parse_rows(html: &str, source: &SourceDescriptor) -> Vec<RawLegalFact> {
    let (Ok(grid), Ok(table), Ok(cell), Ok(link)) = (
        selector(DATA_GRID_ROWS),
        selector(TABLE_ROWS),
        selector("td"),
        selector("a[href]"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut rows: Vec<ElementRef<'_>> = document.select(&grid).collect();
    if rows.is_empty() {
        rows = document.select(&table).collect();
    }

    let mut facts = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.select(&cell).map(text_of).collect();
        if cells.len() < 3 {
            continue;
        }
        let number = sanitize_id(&cells[0]);
        if !number.chars().any(|c| c.is_ascii_alphanumeric()) {
            tracing::warn!(source = %source.id, row = %cells.join(" | "), "Row without document number, skipping");
            continue;
        }

        let title = cells[1].clone();
        let date = match parse_date_lenient(&cells[2]) {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => cells[2].clone(),
        };
        let url = row
            .select(&link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve(source.endpoint, href));

        let mut fact = RawLegalFact::new(
            source.id,
            qualify(IngestionMethod::BrowserScrape, source.id, &number),
        );
        fact.impact = Some(classify_impact(&title));
        fact.title = (!title.is_empty()).then_some(title);
        fact.date = (!date.is_empty()).then_some(date);
        fact.status = Some("draft".into());
        fact.url = url;
        facts.push(fact);
    }
    facts
}

/// Degraded extraction from the fallback page: every project-looking link,
/// dated `today`, with ids `fallback-1`, `fallback-2`, ... in page order.
pub fn parse_fallback(
    html: &str,
    source: &SourceDescriptor,
    base: &str,
    today: NaiveDate,
) -> Result<Vec<RawLegalFact>, AppError> {
    let link = selector("a[href]")?;
    let pattern = Regex::new(PROJECT_LINK_PATTERN)
        .map_err(|e| AppError::Generic(format!("Invalid link pattern: {e}")))?;

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut facts = Vec::new();

    for anchor in document.select(&link) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let title = text_of(anchor);
        if title.chars().count() < MIN_LINK_TEXT || !pattern.is_match(href) {
            continue;
        }
        let Some(url) = resolve(base, href) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let n = facts.len() + 1;
        let mut fact = RawLegalFact::new(
            source.id,
            qualify(IngestionMethod::BrowserScrape, source.id, &format!("fallback-{n}")),
        );
        fact.impact = Some(classify_impact(&title));
        fact.title = Some(title);
        fact.date = Some(today.format("%Y-%m-%d").to_string());
        fact.status = Some("draft".into());
        fact.url = Some(url);
        facts.push(fact);
    }

    tracing::info!(source = %source.id, links = facts.len(), "Fallback extraction finished");
    Ok(facts)
}
