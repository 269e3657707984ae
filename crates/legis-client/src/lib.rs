#[cfg(feature = "browser")]
pub mod browser_renderer;
pub mod fetcher;
pub mod scrape;

#[cfg(feature = "browser")]
pub use browser_renderer::ChromiumRenderer;
pub use fetcher::ReqwestClient;
pub use scrape::BrowserExtractor;
