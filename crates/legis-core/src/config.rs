use std::time::Duration;

use crate::error::AppError;
use crate::harvest::FetchWindow;
use crate::models::IngestionMethod;

/// Scheduling and fetch settings for the ingestion workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// When false the scheduler starts no timers (one-shot commands still work).
    pub workers_enabled: bool,
    pub api_interval: Duration,
    pub feed_interval: Duration,
    pub browser_interval: Duration,
    pub fetch_timeout: Duration,
    /// Delay between the first fires of consecutive workers.
    pub startup_stagger: Duration,
    pub fetch_limit: Option<usize>,
    pub lookback_days: Option<u32>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers_enabled: true,
            api_interval: Duration::from_secs(15 * 60),
            feed_interval: Duration::from_secs(60 * 60),
            browser_interval: Duration::from_secs(6 * 60 * 60),
            fetch_timeout: Duration::from_secs(30),
            startup_stagger: Duration::from_secs(5),
            fetch_limit: Some(100),
            lookback_days: Some(7),
        }
    }
}

impl IngestConfig {
    /// Read configuration from environment variables.
    ///
    /// - `LEGIS_DISABLE_WORKERS` (`1`/`true` disables the scheduler)
    /// - `LEGIS_API_INTERVAL_SECS` (default 900)
    /// - `LEGIS_FEED_INTERVAL_SECS` (default 3600)
    /// - `LEGIS_BROWSER_INTERVAL_SECS` (default 21600)
    /// - `LEGIS_FETCH_TIMEOUT_SECS` (default 30)
    /// - `LEGIS_STARTUP_STAGGER_SECS` (default 5)
    /// - `LEGIS_FETCH_LIMIT` (default 100, `0` for no cap)
    /// - `LEGIS_LOOKBACK_DAYS` (default 7, `0` for no lower bound)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let workers_enabled = match lookup("LEGIS_DISABLE_WORKERS") {
            None => true,
            Some(raw) => !parse_flag("LEGIS_DISABLE_WORKERS", &raw)?,
        };

        let secs = |key: &str, default: Duration| -> Result<Duration, AppError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => {
                    let parsed: u64 = parse_number(key, &raw)?;
                    if parsed == 0 {
                        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
                    }
                    Ok(Duration::from_secs(parsed))
                }
            }
        };

        let fetch_limit = match lookup("LEGIS_FETCH_LIMIT") {
            None => defaults.fetch_limit,
            Some(raw) => Some(parse_number::<usize>("LEGIS_FETCH_LIMIT", &raw)?).filter(|n| *n > 0),
        };
        let lookback_days = match lookup("LEGIS_LOOKBACK_DAYS") {
            None => defaults.lookback_days,
            Some(raw) => Some(parse_number::<u32>("LEGIS_LOOKBACK_DAYS", &raw)?).filter(|n| *n > 0),
        };

        Ok(Self {
            workers_enabled,
            api_interval: secs("LEGIS_API_INTERVAL_SECS", defaults.api_interval)?,
            feed_interval: secs("LEGIS_FEED_INTERVAL_SECS", defaults.feed_interval)?,
            browser_interval: secs("LEGIS_BROWSER_INTERVAL_SECS", defaults.browser_interval)?,
            fetch_timeout: secs("LEGIS_FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            startup_stagger: match lookup("LEGIS_STARTUP_STAGGER_SECS") {
                None => defaults.startup_stagger,
                Some(raw) => Duration::from_secs(parse_number("LEGIS_STARTUP_STAGGER_SECS", &raw)?),
            },
            fetch_limit,
            lookback_days,
        })
    }

    pub fn interval(&self, method: IngestionMethod) -> Duration {
        match method {
            IngestionMethod::StructuredApi => self.api_interval,
            IngestionMethod::Feed => self.feed_interval,
            IngestionMethod::BrowserScrape => self.browser_interval,
        }
    }

    pub fn fetch_window(&self) -> FetchWindow {
        FetchWindow {
            limit: self.fetch_limit,
            lookback_days: self.lookback_days,
        }
    }

    pub fn with_interval(mut self, method: IngestionMethod, interval: Duration) -> Self {
        match method {
            IngestionMethod::StructuredApi => self.api_interval = interval,
            IngestionMethod::Feed => self.feed_interval = interval,
            IngestionMethod::BrowserScrape => self.browser_interval = interval,
        }
        self
    }

    pub fn with_startup_stagger(mut self, stagger: Duration) -> Self {
        self.startup_stagger = stagger;
        self
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a non-negative integer"))
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(AppError::ConfigError(format!(
            "Invalid {key} '{raw}': expected true/false"
        ))),
    }
}
