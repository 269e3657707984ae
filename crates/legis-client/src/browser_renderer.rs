use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use legis_core::error::AppError;
use legis_core::traits::PageRenderer;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Pause after the awaited selector appears, for late-bound grid rows.
const SETTLE_DELAY: Duration = Duration::from_millis(1500);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Headless Chromium renderer driven over the Chrome DevTools Protocol.
///
/// The browser is launched on first use and shared across clones; each
/// render opens its own tab and closes it on every exit path.
/// [`PageRenderer::shutdown`] closes the browser; a later render relaunches it.
#[derive(Clone, Default)]
pub struct ChromiumRenderer {
    session: Arc<Mutex<Option<Session>>>,
}

impl ChromiumRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn launch() -> Result<Session, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        // Snap-packaged Chromium ships a wrapper that rejects the flags below.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--no-first-run")
            .arg("--lang=pl-PL")
            .build()
            .map_err(|e| AppError::RenderError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Session { browser, handler })
    }

    /// Locate the real Chrome/Chromium binary. `CHROME_BIN` wins; `None` lets
    /// `chromiumoxide` do its own lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    async fn open(&self, url: &str) -> Result<Page, AppError> {
        let mut guard = self.session.lock().await;
        let session = match guard.as_mut() {
            Some(session) => session,
            None => guard.insert(Self::launch().await?),
        };
        session
            .browser
            .new_page(url)
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to navigate to {url}: {e}")))
    }
}

async fn wait_and_read(
    page: &Page,
    url: &str,
    wait_for: &[&str],
    timeout: Duration,
) -> Result<String, AppError> {
    let deadline = Instant::now() + timeout;
    loop {
        let mut matched = None;
        for selector in wait_for {
            if page.find_element(*selector).await.is_ok() {
                matched = Some(*selector);
                break;
            }
        }
        if let Some(selector) = matched {
            tracing::debug!(%url, %selector, "Selector matched");
            break;
        }
        if Instant::now() >= deadline {
            return Err(AppError::RenderError(format!(
                "None of {wait_for:?} appeared on {url} within {}s",
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    tokio::time::sleep(SETTLE_DELAY).await;
    page.content()
        .await
        .map_err(|e| AppError::RenderError(format!("Failed to read page content: {e}")))
}

impl PageRenderer for ChromiumRenderer {
    async fn render(
        &self,
        url: &str,
        wait_for: &[&str],
        timeout: Duration,
    ) -> Result<String, AppError> {
        let page = self.open(url).await?;
        let html = wait_and_read(&page, url, wait_for, timeout).await;
        if let Err(e) = page.close().await {
            tracing::debug!(%url, error = %e, "Failed to close tab");
        }
        html
    }

    async fn shutdown(&self) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };
        if let Err(e) = session.browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }
        let _ = session.browser.wait().await;
        session.handler.abort();
        tracing::info!("Browser session closed");
    }
}
