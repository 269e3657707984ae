use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use legis_client::{BrowserExtractor, ReqwestClient};
use legis_core::harvest::{ApiHarvester, FeedHarvester};
use legis_core::models::{CompositeIdentity, IngestionMethod};
use legis_core::query::{FactQuery, QueryService};
use legis_core::traits::FactStore;
use legis_core::{IngestConfig, MemoryStore, Orchestrator, SourceRegistry, TracingWorkerReporter};
use legis_db::{Database, DatabaseConfig};

#[cfg(feature = "browser")]
use legis_client::ChromiumRenderer as Renderer;
#[cfg(not(feature = "browser"))]
use unavailable::UnavailableRenderer as Renderer;

#[derive(Parser)]
#[command(name = "legis", version, about = "Multi-source legal document ingestion")]
struct Cli {
    /// PostgreSQL connection string; facts are kept in memory when unset
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduled workers until interrupted
    Run,

    /// Run one ingestion cycle and print its report
    Ingest {
        /// Source family (structured-api, feed, browser-scrape); all when omitted
        #[arg(short, long)]
        family: Option<IngestionMethod>,
    },

    /// Query the catalog
    Facts {
        /// Window in days, counted back from today
        #[arg(short, long)]
        days: Option<u32>,

        /// Only facts ingested by this family
        #[arg(short, long)]
        method: Option<IngestionMethod>,

        /// Only facts from this source
        #[arg(short, long)]
        source: Option<String>,

        /// Fetch these composite identities instead of a date window
        #[arg(long = "identity", conflicts_with_all = ["days", "method", "source"])]
        identities: Vec<String>,
    },

    /// List configured sources
    Sources {
        /// Include inactive sources
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("legis=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Sources { all } = cli.command {
        cmd_sources(all);
        return Ok(());
    }

    match database_config(cli.database_url)? {
        Some(config) => {
            let db = Database::connect(&config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await?;
            tracing::info!("Using PostgreSQL fact store");
            dispatch(cli.command, db.fact_repo()).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, facts are kept in memory");
            dispatch(cli.command, MemoryStore::new()).await
        }
    }
}

fn database_config(url: Option<String>) -> Result<Option<DatabaseConfig>> {
    Ok(DatabaseConfig::from_lookup(|key| match key {
        "DATABASE_URL" => url.clone(),
        _ => std::env::var(key).ok(),
    })?)
}

async fn dispatch<S: FactStore + 'static>(command: Commands, store: S) -> Result<()> {
    match command {
        Commands::Run => cmd_run(store).await,
        Commands::Ingest { family } => cmd_ingest(store, family).await,
        Commands::Facts {
            days,
            method,
            source,
            identities,
        } => {
            let query = FactQuery {
                range_days: days,
                ingestion_method: method,
                source_id: source,
            };
            cmd_facts(store, &query, &identities).await
        }
        Commands::Sources { all } => {
            cmd_sources(all);
            Ok(())
        }
    }
}

type Engine<S> = Orchestrator<
    ApiHarvester<ReqwestClient>,
    FeedHarvester<ReqwestClient>,
    BrowserExtractor<Renderer>,
    S,
>;

fn build_engine<S: FactStore + 'static>(store: S) -> Result<Engine<S>> {
    let config = IngestConfig::from_env()?;
    let client =
        ReqwestClient::with_timeout(config.fetch_timeout).context("Failed to create HTTP client")?;
    let window = config.fetch_window();

    Ok(Orchestrator::new(
        SourceRegistry::builtin(),
        store,
        ApiHarvester::new(client.clone(), window),
        FeedHarvester::new(client, window),
        BrowserExtractor::new(Renderer::new()),
        config,
    ))
}

async fn cmd_run<S: FactStore + 'static>(store: S) -> Result<()> {
    let engine = build_engine(store)?;
    engine.start(Arc::new(TracingWorkerReporter))?;
    tracing::info!("Workers started, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;
    tracing::info!("Shutdown signal received");

    engine.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&engine.statuses())?);
    Ok(())
}

async fn cmd_ingest<S: FactStore + 'static>(store: S, family: Option<IngestionMethod>) -> Result<()> {
    let engine = build_engine(store)?;
    let families = match family {
        Some(method) => vec![method],
        None => IngestionMethod::ALL.to_vec(),
    };

    let mut reports = Vec::new();
    for method in families {
        tracing::info!(family = %method, "Running one cycle");
        if let Some(report) = engine.run_once(method, &TracingWorkerReporter).await {
            reports.push(report);
        }
    }
    engine.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn cmd_facts<S: FactStore>(store: S, query: &FactQuery, identities: &[String]) -> Result<()> {
    let service = QueryService::new(store);

    let facts = if identities.is_empty() {
        service.get_facts(query).await?
    } else {
        let parsed = identities
            .iter()
            .map(|raw| {
                CompositeIdentity::parse(raw).with_context(|| {
                    format!("Invalid identity '{raw}', expected <source>:<document>:<YYYY-MM-DD>")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        service.get_facts_by_identities(&parsed).await?
    };

    if facts.is_empty() {
        tracing::info!("No facts matched");
    }
    println!("{}", serde_json::to_string_pretty(&facts)?);
    Ok(())
}

fn cmd_sources(all: bool) {
    let registry = SourceRegistry::builtin();
    let sources: Vec<_> = if all {
        registry.all().iter().collect()
    } else {
        registry.list_active()
    };

    for source in sources {
        println!(
            "{:<8} {:<15} {:<17} {:>3}  {}{}",
            source.id,
            source.method,
            source.encoding,
            source.priority,
            source.name,
            if source.active { "" } else { "  (inactive)" }
        );
        println!("         {}", source.endpoint);
    }
}

#[cfg(not(feature = "browser"))]
mod unavailable {
    use std::time::Duration;

    use legis_core::error::AppError;
    use legis_core::traits::PageRenderer;

    /// Stand-in used when the binary is built without the `browser` feature:
    /// every render fails, so browser sources report a failure each cycle.
    #[derive(Debug, Clone, Default)]
    pub struct UnavailableRenderer;

    impl UnavailableRenderer {
        pub fn new() -> Self {
            Self
        }
    }

    impl PageRenderer for UnavailableRenderer {
        async fn render(
            &self,
            url: &str,
            _wait_for: &[&str],
            _timeout: Duration,
        ) -> Result<String, AppError> {
            Err(AppError::RenderError(format!(
                "cannot render {url}: built without the `browser` feature"
            )))
        }

        async fn shutdown(&self) {}
    }
}
