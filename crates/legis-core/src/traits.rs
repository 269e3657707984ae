use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{
    CanonicalLegalFact, CompositeIdentity, FetchParams, RawLegalFact, RawPayload, SourceDescriptor,
    UpsertOutcome,
};

/// Fetches payloads from a source endpoint, negotiating the wire format.
///
/// Transport faults are logged by the implementation and surface as an empty
/// result, so one unreachable source never fails a cycle.
pub trait DocumentClient: Send + Sync + Clone {
    fn fetch_documents(
        &self,
        source: &SourceDescriptor,
        params: &FetchParams,
    ) -> impl Future<Output = Vec<RawPayload>> + Send;

    /// Fetch one document from the source's detail endpoint, if it has one.
    fn fetch_detail(
        &self,
        source: &SourceDescriptor,
        document_id: &str,
    ) -> impl Future<Output = Option<RawPayload>> + Send;
}

/// Renders a script-driven page and returns the resulting HTML.
pub trait PageRenderer: Send + Sync + Clone {
    /// Navigate to `url`, wait (bounded by `timeout`) until one of
    /// `wait_for` selectors matches, and return the rendered document.
    fn render(
        &self,
        url: &str,
        wait_for: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Release any rendering sessions. Safe to call more than once.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}

/// Turns one source into raw facts. Each ingestion family has its own
/// implementation; the worker drives them uniformly.
pub trait Harvester: Send + Sync + Clone {
    fn harvest(
        &self,
        source: &SourceDescriptor,
    ) -> impl Future<Output = Result<Vec<RawLegalFact>, AppError>> + Send;

    /// Extra detail for a document seen for the first time. Returns the fact
    /// unchanged when there is nothing to add.
    fn enrich(
        &self,
        source: &SourceDescriptor,
        fact: RawLegalFact,
    ) -> impl Future<Output = RawLegalFact> + Send {
        let _ = source;
        async move { fact }
    }

    /// Release resources held for harvesting (rendering sessions).
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Persists canonical facts keyed by composite identity.
pub trait FactStore: Send + Sync + Clone {
    /// Insert, or update the mutable fields of, the fact with this identity.
    fn upsert(
        &self,
        fact: &CanonicalLegalFact,
    ) -> impl Future<Output = Result<UpsertOutcome, AppError>> + Send;

    fn exists(
        &self,
        identity: &CompositeIdentity,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Subset of `identities` already stored.
    fn existing_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> impl Future<Output = Result<Vec<CompositeIdentity>, AppError>> + Send;

    /// Facts dated on or after `from`, newest first.
    fn query_by_date_range(
        &self,
        from: NaiveDate,
    ) -> impl Future<Output = Result<Vec<CanonicalLegalFact>, AppError>> + Send;

    fn get_by_identities(
        &self,
        identities: &[CompositeIdentity],
    ) -> impl Future<Output = Result<Vec<CanonicalLegalFact>, AppError>> + Send;
}
