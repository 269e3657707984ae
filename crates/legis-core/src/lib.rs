pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod harvest;
pub mod identity;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod query;
pub mod registry;
pub mod store;
pub mod traits;
pub mod util;
pub mod worker;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::IngestConfig;
pub use error::{AppError, FaultClass};
pub use models::{
    CanonicalLegalFact, CompositeIdentity, Encoding, FetchParams, Impact, IngestionMethod,
    LegalStatus, RawLegalFact, RawPayload, SourceDescriptor, UpsertOutcome,
};
pub use orchestrator::Orchestrator;
pub use registry::SourceRegistry;
pub use store::MemoryStore;
pub use traits::{DocumentClient, FactStore, Harvester, PageRenderer};
pub use worker::{TracingWorkerReporter, WorkerReporter, WorkerStatus};
