/// Smoke-test for `ChromiumRenderer` and `BrowserExtractor`.
///
/// Launches a headless Chromium, renders the legislation portal listing and
/// prints the first extracted rows.
///
/// Run with:
///   cargo run -p legis-client --example render_smoke --features browser
use legis_client::{BrowserExtractor, ChromiumRenderer};
use legis_core::registry::SourceRegistry;
use legis_core::traits::Harvester;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let source = SourceRegistry::builtin()
        .get("rcl")
        .ok_or_else(|| anyhow::anyhow!("rcl source missing from registry"))?;

    println!("Rendering {} ...", source.endpoint);
    let extractor = BrowserExtractor::new(ChromiumRenderer::new());
    let result = extractor.harvest(source).await;
    extractor.shutdown().await;

    let facts = result?;
    anyhow::ensure!(!facts.is_empty(), "no rows extracted from {}", source.endpoint);

    println!("OK, {} rows", facts.len());
    for fact in facts.iter().take(5) {
        println!(
            "{}  {}  {}",
            fact.id,
            fact.date.as_deref().unwrap_or("-"),
            fact.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}
