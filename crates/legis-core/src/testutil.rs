//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{
    CanonicalLegalFact, CompositeIdentity, FetchParams, RawLegalFact, RawPayload,
    SourceDescriptor, UpsertOutcome,
};
use crate::traits::{DocumentClient, FactStore, Harvester, PageRenderer};
use crate::worker::{WorkerEvent, WorkerReporter};

// ---------------------------------------------------------------------------
// MockClient
// ---------------------------------------------------------------------------

/// Mock client that returns the same payloads on every fetch.
#[derive(Clone, Default)]
pub struct MockClient {
    payloads: Arc<Vec<RawPayload>>,
    detail: Option<Arc<RawPayload>>,
    fetches: Arc<Mutex<Vec<FetchParams>>>,
    detail_requests: Arc<Mutex<Vec<String>>>,
}

impl MockClient {
    pub fn new(payloads: Vec<RawPayload>) -> Self {
        Self {
            payloads: Arc::new(payloads),
            ..Default::default()
        }
    }

    /// Payload returned by every detail lookup.
    pub fn with_detail(mut self, payload: RawPayload) -> Self {
        self.detail = Some(Arc::new(payload));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn last_params(&self) -> Option<FetchParams> {
        self.fetches.lock().unwrap().last().cloned()
    }

    pub fn detail_requests(&self) -> Vec<String> {
        self.detail_requests.lock().unwrap().clone()
    }
}

impl DocumentClient for MockClient {
    async fn fetch_documents(
        &self,
        _source: &SourceDescriptor,
        params: &FetchParams,
    ) -> Vec<RawPayload> {
        self.fetches.lock().unwrap().push(params.clone());
        self.payloads.as_ref().clone()
    }

    async fn fetch_detail(
        &self,
        _source: &SourceDescriptor,
        document_id: &str,
    ) -> Option<RawPayload> {
        self.detail_requests
            .lock()
            .unwrap()
            .push(document_id.to_string());
        self.detail.as_deref().cloned()
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Store whose every operation fails with a persistence error.
#[derive(Clone, Default)]
pub struct MockStore {
    calls: Arc<Mutex<u32>>,
}

impl MockStore {
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    fn fail<T>(&self) -> Result<T, AppError> {
        *self.calls.lock().unwrap() += 1;
        Err(AppError::DatabaseError("connection reset".into()))
    }
}

impl FactStore for MockStore {
    async fn upsert(&self, _fact: &CanonicalLegalFact) -> Result<UpsertOutcome, AppError> {
        self.fail()
    }

    async fn exists(&self, _identity: &CompositeIdentity) -> Result<bool, AppError> {
        self.fail()
    }

    async fn existing_identities(
        &self,
        _identities: &[CompositeIdentity],
    ) -> Result<Vec<CompositeIdentity>, AppError> {
        self.fail()
    }

    async fn query_by_date_range(
        &self,
        _from: NaiveDate,
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        self.fail()
    }

    async fn get_by_identities(
        &self,
        _identities: &[CompositeIdentity],
    ) -> Result<Vec<CanonicalLegalFact>, AppError> {
        self.fail()
    }
}

// ---------------------------------------------------------------------------
// MockHarvester
// ---------------------------------------------------------------------------

/// Harvester with canned facts (or errors) per source id.
#[derive(Clone, Default)]
pub struct MockHarvester {
    facts: Arc<Mutex<HashMap<String, Vec<RawLegalFact>>>>,
    errors: Arc<Mutex<HashMap<String, String>>>,
    delay: Option<Duration>,
    harvested: Arc<Mutex<Vec<String>>>,
    enriched: Arc<Mutex<Vec<String>>>,
    shutdowns: Arc<Mutex<u32>>,
}

impl MockHarvester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(self, source_id: &str, facts: Vec<RawLegalFact>) -> Self {
        self.facts
            .lock()
            .unwrap()
            .insert(source_id.to_string(), facts);
        self
    }

    /// Harvesting `source_id` fails with a network error.
    pub fn with_error(self, source_id: &str, message: &str) -> Self {
        self.errors
            .lock()
            .unwrap()
            .insert(source_id.to_string(), message.to_string());
        self
    }

    /// Every harvest sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn harvest_count(&self) -> usize {
        self.harvested.lock().unwrap().len()
    }

    pub fn harvested_sources(&self) -> Vec<String> {
        self.harvested.lock().unwrap().clone()
    }

    pub fn enriched_ids(&self) -> Vec<String> {
        self.enriched.lock().unwrap().clone()
    }

    pub fn shutdown_count(&self) -> u32 {
        *self.shutdowns.lock().unwrap()
    }
}

impl Harvester for MockHarvester {
    async fn harvest(&self, source: &SourceDescriptor) -> Result<Vec<RawLegalFact>, AppError> {
        self.harvested.lock().unwrap().push(source.id.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.errors.lock().unwrap().get(source.id) {
            return Err(AppError::NetworkError(message.clone()));
        }
        Ok(self
            .facts
            .lock()
            .unwrap()
            .get(source.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn enrich(&self, _source: &SourceDescriptor, fact: RawLegalFact) -> RawLegalFact {
        self.enriched.lock().unwrap().push(fact.id.clone());
        fact
    }

    async fn shutdown(&self) {
        *self.shutdowns.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

/// Renderer serving canned HTML snapshots by URL. Unknown URLs fail.
#[derive(Clone, Default)]
pub struct MockRenderer {
    pages: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    rendered: Arc<Mutex<Vec<String>>>,
    shutdowns: Arc<Mutex<u32>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn with_failure(self, url: &str, message: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
        self
    }

    pub fn render_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }

    pub fn rendered_urls(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn shutdown_count(&self) -> u32 {
        *self.shutdowns.lock().unwrap()
    }
}

impl PageRenderer for MockRenderer {
    async fn render(
        &self,
        url: &str,
        _wait_for: &[&str],
        _timeout: Duration,
    ) -> Result<String, AppError> {
        self.rendered.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().get(url) {
            Some(Ok(html)) => Ok(html.clone()),
            Some(Err(message)) => Err(AppError::RenderError(message.clone())),
            None => Err(AppError::RenderError(format!("no snapshot for {url}"))),
        }
    }

    async fn shutdown(&self) {
        *self.shutdowns.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records the kind of every event it receives.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == kind)
            .count()
    }
}

impl WorkerReporter for RecordingReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let kind = match event {
            WorkerEvent::CycleSkipped { .. } => "cycle_skipped",
            WorkerEvent::CycleStarted { .. } => "cycle_started",
            WorkerEvent::SourceFailed { .. } => "source_failed",
            WorkerEvent::DocumentFailed { .. } => "document_failed",
            WorkerEvent::SourceCompleted { .. } => "source_completed",
            WorkerEvent::CycleCompleted { .. } => "cycle_completed",
            WorkerEvent::Stopped { .. } => "stopped",
        };
        self.events.lock().unwrap().push(kind);
    }
}
