//! Schedules the three ingestion workers on independent timers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::join;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::IngestConfig;
use crate::error::AppError;
use crate::models::IngestionMethod;
use crate::registry::SourceRegistry;
use crate::traits::{FactStore, Harvester};
use crate::worker::{CycleReport, WorkerEvent, WorkerReporter, WorkerService, WorkerStatus};

/// Owns one worker per ingestion family and their timers.
pub struct Orchestrator<A, F, B, S>
where
    A: Harvester,
    F: Harvester,
    B: Harvester,
    S: FactStore,
{
    api: Arc<WorkerService<A, S>>,
    feed: Arc<WorkerService<F, S>>,
    browser: Arc<WorkerService<B, S>>,
    config: IngestConfig,
    started: AtomicBool,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl<A, F, B, S> Orchestrator<A, F, B, S>
where
    A: Harvester + 'static,
    F: Harvester + 'static,
    B: Harvester + 'static,
    S: FactStore + 'static,
{
    pub fn new(
        registry: SourceRegistry,
        store: S,
        api: A,
        feed: F,
        browser: B,
        config: IngestConfig,
    ) -> Self {
        let worker = |method| registry.active_for(method);
        Self {
            api: Arc::new(WorkerService::new(
                IngestionMethod::StructuredApi,
                api,
                store.clone(),
                worker(IngestionMethod::StructuredApi),
            )),
            feed: Arc::new(WorkerService::new(
                IngestionMethod::Feed,
                feed,
                store.clone(),
                worker(IngestionMethod::Feed),
            )),
            browser: Arc::new(WorkerService::new(
                IngestionMethod::BrowserScrape,
                browser,
                store,
                worker(IngestionMethod::BrowserScrape),
            )),
            config,
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Start every worker that has sources. First fires are staggered by
    /// `startup_stagger`; later fires follow each worker's interval.
    pub fn start<WR: WorkerReporter + 'static>(&self, reporter: Arc<WR>) -> Result<(), AppError> {
        self.validate()?;
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(AppError::ConfigError("orchestrator already started".into()));
        }
        if !self.config.workers_enabled {
            tracing::info!("Scheduled workers disabled");
            return Ok(());
        }

        let mut slot = 0u32;
        let mut next_delay = || {
            let delay = self.config.startup_stagger * slot;
            slot += 1;
            delay
        };

        if !self.api.sources().is_empty() {
            self.schedule(Arc::clone(&self.api), next_delay(), Arc::clone(&reporter));
        }
        if !self.feed.sources().is_empty() {
            self.schedule(Arc::clone(&self.feed), next_delay(), Arc::clone(&reporter));
        }
        if !self.browser.sources().is_empty() {
            self.schedule(Arc::clone(&self.browser), next_delay(), reporter);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        let sources =
            self.api.sources().len() + self.feed.sources().len() + self.browser.sources().len();
        if sources == 0 {
            return Err(AppError::ConfigError("no active sources configured".into()));
        }
        for method in IngestionMethod::ALL {
            if self.config.interval(method).is_zero() {
                return Err(AppError::ConfigError(format!(
                    "{method} worker interval must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    fn schedule<H, WR>(&self, worker: Arc<WorkerService<H, S>>, delay: Duration, reporter: Arc<WR>)
    where
        H: Harvester + 'static,
        WR: WorkerReporter + 'static,
    {
        let period = self.config.interval(worker.method());
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();

        tracing::info!(
            worker = %worker.name(),
            sources = worker.sources().len(),
            interval_secs = period.as_secs(),
            delay_secs = delay.as_secs(),
            "Scheduling worker"
        );

        self.tracker.spawn(async move {
            let mut ticks = interval_at(Instant::now() + delay, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        let worker = Arc::clone(&worker);
                        let reporter = Arc::clone(&reporter);
                        // overlapping fires are dropped inside `fire`
                        tracker.spawn(async move {
                            worker.fire(reporter.as_ref()).await;
                        });
                    }
                }
            }

            reporter.report(WorkerEvent::Stopped {
                worker: worker.name(),
            });
        });
    }

    /// Run a single cycle of one family now. `None` if that worker is busy.
    pub async fn run_once<WR: WorkerReporter>(
        &self,
        method: IngestionMethod,
        reporter: &WR,
    ) -> Option<CycleReport> {
        match method {
            IngestionMethod::StructuredApi => self.api.fire(reporter).await,
            IngestionMethod::Feed => self.feed.fire(reporter).await,
            IngestionMethod::BrowserScrape => self.browser.fire(reporter).await,
        }
    }

    pub fn statuses(&self) -> Vec<WorkerStatus> {
        vec![self.api.status(), self.feed.status(), self.browser.status()]
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Stop the timers, wait for in-flight cycles, then release harvester
    /// resources.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        join!(
            self.api.shutdown(),
            self.feed.shutdown(),
            self.browser.shutdown()
        );
        tracing::info!("Orchestrator stopped");
    }
}
