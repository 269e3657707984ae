//! Harvesters for the fetch-and-parse families: structured APIs and feeds.

use chrono::{Days, Utc};

use crate::error::AppError;
use crate::identity::derive_identity;
use crate::models::{FetchParams, IngestionMethod, RawLegalFact, SourceDescriptor};
use crate::parser;
use crate::traits::{DocumentClient, Harvester};

/// Request window applied to every fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchWindow {
    pub limit: Option<usize>,
    /// Only ask for documents published in the last N days.
    pub lookback_days: Option<u32>,
}

impl FetchWindow {
    pub fn params(&self) -> FetchParams {
        let today = Utc::now().date_naive();
        FetchParams {
            limit: self.limit,
            since: self
                .lookback_days
                .and_then(|days| today.checked_sub_days(Days::new(u64::from(days)))),
        }
    }
}

async fn fetch_and_parse<C: DocumentClient>(
    client: &C,
    source: &SourceDescriptor,
    window: &FetchWindow,
) -> Vec<RawLegalFact> {
    let payloads = client.fetch_documents(source, &window.params()).await;
    payloads
        .iter()
        .flat_map(|payload| parser::parse(payload, source.id))
        .collect()
}

/// Structured linked-data APIs. New documents are enriched from the
/// source's detail endpoint when it declares one.
#[derive(Debug, Clone)]
pub struct ApiHarvester<C: DocumentClient> {
    client: C,
    window: FetchWindow,
}

impl<C: DocumentClient> ApiHarvester<C> {
    pub fn new(client: C, window: FetchWindow) -> Self {
        Self { client, window }
    }
}

impl<C: DocumentClient> Harvester for ApiHarvester<C> {
    async fn harvest(&self, source: &SourceDescriptor) -> Result<Vec<RawLegalFact>, AppError> {
        Ok(fetch_and_parse(&self.client, source, &self.window).await)
    }

    async fn enrich(&self, source: &SourceDescriptor, fact: RawLegalFact) -> RawLegalFact {
        if source.detail_endpoint.is_none() {
            return fact;
        }
        let document_id =
            derive_identity(&fact.id, IngestionMethod::StructuredApi, source.id).document_id;

        let Some(payload) = self.client.fetch_detail(source, &document_id).await else {
            return fact;
        };
        match parser::parse(&payload, source.id).into_iter().next() {
            Some(detail) => fact.fill_missing(detail),
            None => {
                tracing::debug!(source = %source.id, document = %document_id, "Detail payload had no record");
                fact
            }
        }
    }
}

/// RSS/Atom feeds.
#[derive(Debug, Clone)]
pub struct FeedHarvester<C: DocumentClient> {
    client: C,
    window: FetchWindow,
}

impl<C: DocumentClient> FeedHarvester<C> {
    pub fn new(client: C, window: FetchWindow) -> Self {
        Self { client, window }
    }
}

impl<C: DocumentClient> Harvester for FeedHarvester<C> {
    async fn harvest(&self, source: &SourceDescriptor) -> Result<Vec<RawLegalFact>, AppError> {
        Ok(fetch_and_parse(&self.client, source, &self.window).await)
    }
}
