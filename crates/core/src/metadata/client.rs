//! Metadata client: long-poll watch + single-key GET against the fixed
//! metadata host.

use std::time::Duration;

use reqwest::{header::HeaderMap, Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::descriptor::Descriptor;

pub const METADATA_BASE_URL: &str = "http://metadata.google.internal/computeMetadata/v1";
const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR_VALUE: &str = "Google";
const WAIT_TIMEOUT_SECS: u64 = 60;
/// Request-level timeout, slightly greater than the server's own hang time.
const REQUEST_TIMEOUT_SECS: u64 = WAIT_TIMEOUT_SECS + 10;
const INITIAL_ETAG: &str = "NONE";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("metadata response was not valid JSON: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("metadata response was not valid UTF-8 text: {0}")]
    Text(#[source] reqwest::Error),
}

impl MetadataError {
    /// Best-effort classification used by the reconciliation loop's
    /// "second consecutive failure" log message.
    pub fn classify(&self) -> &'static str {
        match self {
            MetadataError::Request(err) => {
                if err.is_timeout() {
                    "timeout"
                } else if err.is_connect() {
                    classify_connect_error(err)
                } else {
                    "network"
                }
            }
            MetadataError::Decode(_) | MetadataError::Text(_) => "decode",
        }
    }
}

fn classify_connect_error(err: &reqwest::Error) -> &'static str {
    use std::error::Error as _;
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<std::io::Error>() {
            return match io_err.kind() {
                std::io::ErrorKind::NotFound => "dns",
                _ => "network",
            };
        }
        source = inner.source();
    }
    "network"
}

/// Long-poll metadata watcher. Owns the durable etag; safe to share across
/// tasks behind an `Arc` — the etag lives behind an internal lock rather
/// than a process-wide global.
pub struct MetadataClient {
    http: Client,
    base_url: String,
    etag: tokio::sync::RwLock<String>,
}

impl MetadataClient {
    pub fn new() -> Self {
        Self::with_base_url(METADATA_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            METADATA_FLAVOR_HEADER,
            METADATA_FLAVOR_VALUE.parse().expect("static header value"),
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            http,
            base_url,
            etag: tokio::sync::RwLock::new(INITIAL_ETAG.to_string()),
        }
    }

    pub async fn current_etag(&self) -> String {
        self.etag.read().await.clone()
    }

    fn watch_url(&self, etag: &str) -> String {
        format!(
            "{base}/?recursive=true&alt=json&wait_for_change=true&timeout_sec={timeout}&last_etag={etag}",
            base = self.base_url,
            timeout = WAIT_TIMEOUT_SECS,
        )
    }

    /// Issues one long-poll request. Returns `Ok(None)` exactly when `token`
    /// fired during the in-flight request; a cancellation must never surface
    /// as an error.
    pub async fn watch(
        &self,
        token: &CancellationToken,
    ) -> Result<Option<Descriptor>, MetadataError> {
        let etag = self.current_etag().await;
        let url = self.watch_url(&etag);
        debug!(url, "issuing metadata long-poll request");

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            result = self.http.get(&url).send() => result?,
        };

        if let Some(new_etag) = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
        {
            *self.etag.write().await = new_etag.to_string();
        } else {
            *self.etag.write().await = INITIAL_ETAG.to_string();
        }

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%status, "metadata server returned non-200 status");
        }

        let descriptor = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            body = response.json::<Descriptor>() => body.map_err(MetadataError::Decode)?,
        };
        Ok(Some(descriptor))
    }

    /// `GET {base}/{path}` with additional caller-supplied headers, returning
    /// the raw body text (used for single-key reads like enablement probes).
    pub async fn get_key(
        &self,
        path: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<String, MetadataError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.http.get(&url);
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        response.text().await.map_err(MetadataError::Text)
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_url_matches_required_shape() {
        let client = MetadataClient::with_base_url("http://example.test".to_string());
        let url = client.watch_url("bar");
        assert_eq!(
            url,
            "http://example.test/?recursive=true&alt=json&wait_for_change=true&timeout_sec=60&last_etag=bar"
        );
    }

    #[test]
    fn initial_etag_is_none_sentinel() {
        let client = MetadataClient::new();
        assert_eq!(client.watch_url(INITIAL_ETAG), client.watch_url("NONE"));
    }
}
