use std::time::Duration;

use legis_core::error::AppError;
use legis_core::models::{FetchParams, RawPayload, SourceDescriptor};
use legis_core::traits::DocumentClient;
use reqwest::Client;
use reqwest::header::ACCEPT;
use url::Url;

/// Format-negotiating HTTP client using reqwest.
///
/// Advertises the source's encoding in the `Accept` header and classifies the
/// body by shape. Every failure is logged with its fault class and surfaces
/// as an empty result.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let timeout_secs = timeout.as_secs();
        let client = Client::builder()
            .user_agent(concat!("Legis/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    async fn get(&self, url: &Url, accept: &str) -> Result<RawPayload, AppError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })?;
        if body.trim().is_empty() {
            return Err(AppError::FormatError(format!("Empty response body from {url}")));
        }
        Ok(RawPayload::from_body(&body))
    }
}

/// Merge caller params into the source endpoint as `limit` and `dateFrom`.
pub fn request_url(endpoint: &str, params: &FetchParams) -> Result<Url, AppError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| AppError::ConfigError(format!("Invalid endpoint '{endpoint}': {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(limit) = params.limit {
            query.append_pair("limit", &limit.to_string());
        }
        if let Some(since) = params.since {
            query.append_pair("dateFrom", &since.format("%Y-%m-%d").to_string());
        }
    }
    // an empty `?` is left behind when nothing was appended
    if url.query() == Some("") {
        url.set_query(None);
    }
    Ok(url)
}

/// Substitute `{id}` in a detail endpoint template.
pub fn detail_url(template: &str, document_id: &str) -> Result<Url, AppError> {
    let raw = template.replace("{id}", document_id.trim_matches('/'));
    Url::parse(&raw).map_err(|e| AppError::ConfigError(format!("Invalid detail url '{raw}': {e}")))
}

impl DocumentClient for ReqwestClient {
    async fn fetch_documents(
        &self,
        source: &SourceDescriptor,
        params: &FetchParams,
    ) -> Vec<RawPayload> {
        let result = match request_url(source.endpoint, params) {
            Ok(url) => self.get(&url, source.encoding.accept_header()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(payload) => {
                tracing::debug!(source = %source.id, kind = payload.kind(), "Fetched payload");
                vec![payload]
            }
            Err(e) => {
                tracing::warn!(
                    source = %source.id,
                    fault = %e.fault_class(),
                    error = %e,
                    "Fetch failed, source yields nothing this cycle"
                );
                Vec::new()
            }
        }
    }

    async fn fetch_detail(
        &self,
        source: &SourceDescriptor,
        document_id: &str,
    ) -> Option<RawPayload> {
        let template = source.detail_endpoint?;
        let result = match detail_url(template, document_id) {
            Ok(url) => self.get(&url, source.encoding.accept_header()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(
                    source = %source.id,
                    document = %document_id,
                    fault = %e.fault_class(),
                    error = %e,
                    "Detail fetch failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use chrono::NaiveDate;
    use legis_core::models::{Encoding, IngestionMethod};

    fn unreachable_source() -> SourceDescriptor {
        SourceDescriptor {
            id: "offline",
            name: "Offline",
            institution: "test",
            endpoint: "http://127.0.0.1:1/eli",
            encoding: Encoding::Auto,
            method: IngestionMethod::StructuredApi,
            active: true,
            priority: 1,
            category: "legal_act",
            detail_endpoint: Some("http://127.0.0.1:1/eli/{id}"),
            fallback_endpoint: None,
        }
    }

    #[test]
    fn test_request_url_merges_params() {
        let params = FetchParams {
            limit: Some(50),
            since: NaiveDate::from_ymd_opt(2024, 1, 8),
        };
        let url = request_url("https://api.sejm.gov.pl/eli/acts/DU/2024?sort=desc", &params).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.sejm.gov.pl/eli/acts/DU/2024?sort=desc&limit=50&dateFrom=2024-01-08"
        );
    }

    #[test]
    fn test_request_url_without_params() {
        let url = request_url("https://www.gov.pl/web/zdrowie/rss", &FetchParams::default()).unwrap();
        assert_eq!(url.as_str(), "https://www.gov.pl/web/zdrowie/rss");
    }

    #[test]
    fn test_request_url_rejects_bad_endpoint() {
        let err = request_url("not a url", &FetchParams::default()).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_detail_url() {
        let url = detail_url("https://api.sejm.gov.pl/eli/acts/{id}", "DU/2024/1").unwrap();
        assert_eq!(url.as_str(), "https://api.sejm.gov.pl/eli/acts/DU/2024/1");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_returns_empty() {
        let client = ReqwestClient::with_timeout(Duration::from_secs(5)).unwrap();
        let source = unreachable_source();
        let started = Instant::now();

        let payloads = client.fetch_documents(&source, &FetchParams::default()).await;

        assert!(payloads.is_empty());
        assert!(started.elapsed() < Duration::from_secs(6));
        assert!(client.fetch_detail(&source, "DU/2024/1").await.is_none());
    }
}
