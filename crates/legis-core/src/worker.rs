use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;

use crate::dedup::DedupService;
use crate::error::AppError;
use crate::models::{
    CanonicalLegalFact, CompositeIdentity, IngestionMethod, RawLegalFact, SourceDescriptor,
    UpsertOutcome,
};
use crate::normalize::normalize_at;
use crate::traits::{FactStore, Harvester};

/// Events emitted by a worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    /// A timer fired while the previous cycle was still running.
    CycleSkipped {
        worker: &'a str,
    },
    CycleStarted {
        worker: &'a str,
        sources: usize,
    },
    SourceFailed {
        worker: &'a str,
        source: &'a str,
        error: &'a AppError,
    },
    DocumentFailed {
        worker: &'a str,
        source: &'a str,
        identity: &'a CompositeIdentity,
        error: &'a AppError,
    },
    SourceCompleted {
        worker: &'a str,
        report: &'a SourceReport,
    },
    CycleCompleted {
        report: &'a CycleReport,
    },
    Stopped {
        worker: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::CycleSkipped { worker } => {
                tracing::info!(%worker, "Previous cycle still running, skipping fire");
            }
            WorkerEvent::CycleStarted { worker, sources } => {
                tracing::info!(%worker, %sources, "Cycle started");
            }
            WorkerEvent::SourceFailed {
                worker,
                source,
                error,
            } => {
                tracing::warn!(%worker, %source, fault = %error.fault_class(), %error, "Source failed");
            }
            WorkerEvent::DocumentFailed {
                worker,
                source,
                identity,
                error,
            } => {
                tracing::warn!(%worker, %source, %identity, fault = %error.fault_class(), %error, "Document upsert failed");
            }
            WorkerEvent::SourceCompleted { worker, report } => {
                tracing::debug!(
                    %worker,
                    source = %report.source_id,
                    fetched = report.fetched,
                    new = report.new,
                    inserted = report.inserted,
                    updated = report.updated,
                    failed = report.failed,
                    elapsed_ms = report.elapsed_ms,
                    "Source ingested"
                );
            }
            WorkerEvent::CycleCompleted { report } => {
                tracing::info!(
                    worker = %report.worker,
                    sources_ok = report.sources_ok(),
                    sources_failed = report.sources_failed(),
                    inserted = report.inserted(),
                    updated = report.updated(),
                    documents_failed = report.documents_failed(),
                    elapsed_ms = report.elapsed_ms,
                    "Cycle completed"
                );
            }
            WorkerEvent::Stopped { worker } => {
                tracing::info!(%worker, "Worker stopped");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Idle,
}

/// Read-only snapshot of a worker, as exposed to health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub name: String,
    pub status: RunState,
    pub last_run: Option<DateTime<Utc>>,
    pub documents_today: u64,
}

#[derive(Debug, Default)]
struct Progress {
    last_run: Option<DateTime<Utc>>,
    day: Option<NaiveDate>,
    documents_today: u64,
}

/// State record of one worker. The worker mutates it; everyone else reads
/// snapshots.
#[derive(Debug)]
pub struct WorkerState {
    name: String,
    running: AtomicBool,
    progress: Mutex<Progress>,
}

/// Marks the worker running until dropped.
#[derive(Debug)]
pub struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl WorkerState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: AtomicBool::new(false),
            progress: Mutex::new(Progress::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Idle to Running. Returns `None` if a cycle is already in flight.
    pub fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                running: &self.running,
            })
    }

    /// Record a finished cycle. The daily counter restarts on a new UTC day.
    pub fn record_completion(&self, at: DateTime<Utc>, inserted: u64) {
        let mut progress = self.progress();
        let day = at.date_naive();
        if progress.day != Some(day) {
            progress.day = Some(day);
            progress.documents_today = 0;
        }
        progress.documents_today += inserted;
        progress.last_run = Some(at);
    }

    pub fn snapshot(&self) -> WorkerStatus {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> WorkerStatus {
        let progress = self.progress();
        let documents_today = if progress.day == Some(now.date_naive()) {
            progress.documents_today
        } else {
            0
        };
        WorkerStatus {
            name: self.name.clone(),
            status: if self.is_running() {
                RunState::Running
            } else {
                RunState::Idle
            },
            last_run: progress.last_run,
            documents_today,
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        // Progress holds plain counters; a panic mid-update leaves nothing to repair.
        self.progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of ingesting one source within a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub fetched: usize,
    /// Documents not seen before this cycle.
    pub new: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Set when the whole source failed.
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl SourceReport {
    fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Outcome of one worker cycle across all of its sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub worker: String,
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub elapsed_ms: u64,
}

impl CycleReport {
    pub fn inserted(&self) -> usize {
        self.sources.iter().map(|s| s.inserted).sum()
    }

    pub fn updated(&self) -> usize {
        self.sources.iter().map(|s| s.updated).sum()
    }

    pub fn documents_failed(&self) -> usize {
        self.sources.iter().map(|s| s.failed).sum()
    }

    pub fn sources_failed(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn sources_ok(&self) -> usize {
        self.sources.len() - self.sources_failed()
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Runs ingestion cycles for one source family.
pub struct WorkerService<H: Harvester, S: FactStore> {
    method: IngestionMethod,
    harvester: H,
    dedup: DedupService<S>,
    sources: Vec<&'static SourceDescriptor>,
    state: Arc<WorkerState>,
}

impl<H: Harvester, S: FactStore> WorkerService<H, S> {
    pub fn new(
        method: IngestionMethod,
        harvester: H,
        store: S,
        sources: Vec<&'static SourceDescriptor>,
    ) -> Self {
        Self {
            method,
            harvester,
            dedup: DedupService::new(store),
            sources,
            state: Arc::new(WorkerState::new(method.as_str())),
        }
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn method(&self) -> IngestionMethod {
        self.method
    }

    pub fn sources(&self) -> &[&'static SourceDescriptor] {
        &self.sources
    }

    pub fn state(&self) -> &Arc<WorkerState> {
        &self.state
    }

    pub fn status(&self) -> WorkerStatus {
        self.state.snapshot()
    }

    /// Run one cycle unless one is already in flight, in which case the fire
    /// is dropped and `None` returned.
    pub async fn fire<WR: WorkerReporter>(&self, reporter: &WR) -> Option<CycleReport> {
        let Some(_running) = self.state.try_begin() else {
            reporter.report(WorkerEvent::CycleSkipped {
                worker: self.name(),
            });
            return None;
        };

        let report = self.run_cycle(reporter).await;
        let inserted = u64::try_from(report.inserted()).unwrap_or(u64::MAX);
        self.state.record_completion(Utc::now(), inserted);
        Some(report)
    }

    async fn run_cycle<WR: WorkerReporter>(&self, reporter: &WR) -> CycleReport {
        let started_at = Utc::now();
        let started = Instant::now();
        reporter.report(WorkerEvent::CycleStarted {
            worker: self.name(),
            sources: self.sources.len(),
        });

        let sources = join_all(
            self.sources
                .iter()
                .map(|source| self.ingest_source(source, reporter)),
        )
        .await;

        let report = CycleReport {
            worker: self.name().to_string(),
            started_at,
            sources,
            elapsed_ms: elapsed_ms(started),
        };
        reporter.report(WorkerEvent::CycleCompleted { report: &report });
        report
    }

    async fn ingest_source<WR: WorkerReporter>(
        &self,
        source: &SourceDescriptor,
        reporter: &WR,
    ) -> SourceReport {
        let started = Instant::now();
        let mut report = SourceReport::new(source.id);

        let raw = match self.harvester.harvest(source).await {
            Ok(raw) => raw,
            Err(e) => {
                reporter.report(WorkerEvent::SourceFailed {
                    worker: self.name(),
                    source: source.id,
                    error: &e,
                });
                report.error = Some(e.to_string());
                report.elapsed_ms = elapsed_ms(started);
                return report;
            }
        };
        report.fetched = raw.len();

        let now = Utc::now();
        let observed: Vec<(RawLegalFact, CanonicalLegalFact)> = raw
            .into_iter()
            .map(|r| {
                let fact = normalize_at(self.method, &r, now);
                (r, fact)
            })
            .collect();

        let fresh: HashSet<CompositeIdentity> = self
            .dedup
            .filter_new(observed.iter().map(|(_, f)| f.clone()).collect())
            .await
            .into_iter()
            .map(|f| f.identity)
            .collect();
        report.new = fresh.len();

        let known: Vec<CompositeIdentity> = observed
            .iter()
            .map(|(_, f)| f.identity.clone())
            .filter(|identity| !fresh.contains(identity))
            .collect();
        let stored = self.dedup.stored(&known).await;

        // A repeat observation carries listing fields only; what it leaves
        // empty keeps the stored value instead of falling back to defaults.
        for (raw, fact) in observed {
            let fact = if fresh.contains(&fact.identity) {
                let enriched = self.harvester.enrich(source, raw).await;
                normalize_at(self.method, &enriched, now)
            } else if let Some(previous) = stored.get(&fact.identity) {
                normalize_at(self.method, &raw.fill_missing(previous.observed_raw()), now)
            } else {
                fact
            };

            match self.dedup.upsert(&fact).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.failed += 1;
                    reporter.report(WorkerEvent::DocumentFailed {
                        worker: self.name(),
                        source: source.id,
                        identity: &fact.identity,
                        error: &e,
                    });
                }
            }
        }

        report.elapsed_ms = elapsed_ms(started);
        reporter.report(WorkerEvent::SourceCompleted {
            worker: self.name(),
            report: &report,
        });
        report
    }

    /// Release resources held by the harvester.
    pub async fn shutdown(&self) {
        self.harvester.shutdown().await;
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::TimeZone;

    use crate::harvest::{ApiHarvester, FetchWindow};
    use crate::models::RawPayload;
    use crate::registry::SourceRegistry;
    use crate::store::MemoryStore;
    use crate::testutil::{MockClient, MockHarvester, MockStore, RecordingReporter};

    fn source(id: &str) -> &'static SourceDescriptor {
        SourceRegistry::builtin().get(id).unwrap()
    }

    fn raw(source: &str, id: &str, title: &str) -> RawLegalFact {
        let mut raw = RawLegalFact::new(source, id);
        raw.title = Some(title.into());
        raw.date = Some("2024-01-15".into());
        raw
    }

    #[test]
    fn test_state_transitions() {
        let state = WorkerState::new("feed");
        assert!(!state.is_running());

        let guard = state.try_begin().unwrap();
        assert!(state.is_running());
        assert_eq!(state.snapshot().status, RunState::Running);
        assert!(state.try_begin().is_none());

        drop(guard);
        assert!(!state.is_running());
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn test_daily_counter_resets_on_utc_day_change() {
        let state = WorkerState::new("feed");
        let monday = Utc.with_ymd_and_hms(2024, 1, 15, 22, 0, 0).unwrap();
        let monday_late = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2024, 1, 16, 0, 5, 0).unwrap();

        state.record_completion(monday, 3);
        state.record_completion(monday_late, 2);
        assert_eq!(state.snapshot_at(monday_late).documents_today, 5);
        assert_eq!(state.snapshot_at(tuesday).documents_today, 0);

        state.record_completion(tuesday, 1);
        let status = state.snapshot_at(tuesday);
        assert_eq!(status.documents_today, 1);
        assert_eq!(status.last_run, Some(tuesday));
        assert_eq!(status.status, RunState::Idle);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let status = WorkerState::new("browser-scrape").snapshot();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["name"], "browser-scrape");
        assert_eq!(json["documents_today"], 0);
    }

    #[tokio::test]
    async fn test_fire_while_running_issues_no_fetch() {
        let client = MockClient::new(vec![RawPayload::from_body(r#"[{"ELI":"DU/2024/1"}]"#)]);
        let worker = WorkerService::new(
            IngestionMethod::StructuredApi,
            ApiHarvester::new(client.clone(), FetchWindow::default()),
            MemoryStore::new(),
            vec![source("sejm")],
        );
        let reporter = RecordingReporter::default();

        let _running = worker.state().try_begin().unwrap();
        assert!(worker.fire(&reporter).await.is_none());

        assert_eq!(client.fetch_count(), 0);
        assert_eq!(reporter.events(), vec!["cycle_skipped"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_fire_is_dropped() {
        let harvester = MockHarvester::new()
            .with_facts("gov-mz", vec![raw("gov-mz", "rss-1", "A")])
            .with_delay(Duration::from_secs(60));
        let worker = Arc::new(WorkerService::new(
            IngestionMethod::Feed,
            harvester.clone(),
            MemoryStore::new(),
            vec![source("gov-mz")],
        ));

        let first = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.fire(&RecordingReporter::default()).await })
        };
        while !worker.state().is_running() {
            tokio::task::yield_now().await;
        }

        assert!(worker.fire(&RecordingReporter::default()).await.is_none());
        let report = first.await.unwrap().unwrap();

        assert_eq!(harvester.harvest_count(), 1);
        assert_eq!(report.inserted(), 1);
        assert!(!worker.state().is_running());
    }

    #[tokio::test]
    async fn test_cycle_ingests_and_counts() {
        let store = MemoryStore::new();
        let harvester = MockHarvester::new()
            .with_facts(
                "gov-mz",
                vec![raw("gov-mz", "rss-1", "A"), raw("gov-mz", "rss-2", "B")],
            )
            .with_facts("nfz", vec![raw("nfz", "rss-3", "C")]);
        let worker = WorkerService::new(
            IngestionMethod::Feed,
            harvester,
            store.clone(),
            vec![source("gov-mz"), source("nfz")],
        );
        let reporter = RecordingReporter::default();

        let report = worker.fire(&reporter).await.unwrap();

        assert_eq!(report.worker, "feed");
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.inserted(), 3);
        assert_eq!(store.len(), 3);
        assert_eq!(worker.status().documents_today, 3);
        assert!(worker.status().last_run.is_some());
        assert_eq!(reporter.count("source_completed"), 2);
        assert_eq!(reporter.count("cycle_completed"), 1);

        let again = worker.fire(&reporter).await.unwrap();
        assert_eq!(again.inserted(), 0);
        assert_eq!(again.sources.iter().map(|s| s.unchanged).sum::<usize>(), 3);
        assert_eq!(worker.status().documents_today, 3);
    }

    #[tokio::test]
    async fn test_source_failure_is_isolated() {
        let store = MemoryStore::new();
        let harvester = MockHarvester::new()
            .with_error("gov-mz", "connection refused")
            .with_facts("nfz", vec![raw("nfz", "rss-3", "C")]);
        let worker = WorkerService::new(
            IngestionMethod::Feed,
            harvester,
            store.clone(),
            vec![source("gov-mz"), source("nfz")],
        );
        let reporter = RecordingReporter::default();

        let report = worker.fire(&reporter).await.unwrap();

        assert_eq!(report.sources_failed(), 1);
        assert_eq!(report.sources_ok(), 1);
        assert_eq!(report.sources[0].source_id, "gov-mz");
        assert!(report.sources[0].error.is_some());
        assert_eq!(report.inserted(), 1);
        assert_eq!(reporter.count("source_failed"), 1);
    }

    #[tokio::test]
    async fn test_document_failure_is_counted() {
        let harvester = MockHarvester::new().with_facts(
            "gov-mz",
            vec![raw("gov-mz", "rss-1", "A"), raw("gov-mz", "rss-2", "B")],
        );
        let worker = WorkerService::new(
            IngestionMethod::Feed,
            harvester,
            MockStore::failing(),
            vec![source("gov-mz")],
        );
        let reporter = RecordingReporter::default();

        let report = worker.fire(&reporter).await.unwrap();

        let gov = &report.sources[0];
        assert_eq!(gov.fetched, 2);
        assert_eq!(gov.new, 2);
        assert_eq!(gov.failed, 2);
        assert!(gov.error.is_none());
        assert_eq!(reporter.count("document_failed"), 2);
        assert_eq!(worker.status().documents_today, 0);
    }

    #[tokio::test]
    async fn test_only_new_documents_are_enriched() {
        let store = MemoryStore::new();
        let seen = raw("gov-mz", "rss-1", "A");
        store
            .upsert(&normalize_at(IngestionMethod::Feed, &seen, Utc::now()))
            .await
            .unwrap();

        let harvester = MockHarvester::new().with_facts(
            "gov-mz",
            vec![seen.clone(), raw("gov-mz", "rss-2", "B")],
        );
        let worker = WorkerService::new(
            IngestionMethod::Feed,
            harvester.clone(),
            store,
            vec![source("gov-mz")],
        );

        let report = worker.fire(&RecordingReporter::default()).await.unwrap();

        assert_eq!(report.sources[0].new, 1);
        assert_eq!(report.sources[0].unchanged, 1);
        assert_eq!(harvester.enriched_ids(), vec!["rss-2".to_string()]);
    }

    #[tokio::test]
    async fn test_repeat_observation_keeps_detail_fields() {
        let client = MockClient::new(vec![RawPayload::from_body(
            r#"[{"ELI":"DU/2024/1","title":"Ustawa o podatkach","date_publication":"2024-01-15"}]"#,
        )])
        .with_detail(RawPayload::from_body(
            r#"{"ELI":"DU/2024/1","title":"Ustawa o podatkach","description":"Szczegółowy opis z API"}"#,
        ));
        let store = MemoryStore::new();
        let worker = WorkerService::new(
            IngestionMethod::StructuredApi,
            ApiHarvester::new(client.clone(), FetchWindow::default()),
            store.clone(),
            vec![source("sejm")],
        );
        let reporter = RecordingReporter::default();

        let first = worker.fire(&reporter).await.unwrap();
        assert_eq!(first.inserted(), 1);

        let second = worker.fire(&reporter).await.unwrap();
        assert_eq!(second.updated(), 0);
        assert_eq!(second.sources[0].unchanged, 1);
        assert_eq!(client.detail_requests().len(), 1);

        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let stored = store.query_by_date_range(from).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rationale, "Szczegółowy opis z API");
        assert_eq!(stored[0].summary, "Szczegółowy opis z API");
    }
}
