//! Network fetching behind a trait seam.
//!
//! The worker only ever talks to the network through [`NetworkFetcher`],
//! so strategies can be exercised in tests with scripted fetchers. The
//! production implementation is [`HttpFetcher`] on reqwest.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use stashway_core::{Error, WorkerConfig};

/// A successfully fetched network response.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// The final URL after redirects.
    pub final_url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub headers: header::HeaderMap,
    pub bytes: Bytes,
}

impl FetchedResponse {
    /// Headers as owned (name, value) pairs for cache storage.
    ///
    /// Values that are not valid UTF-8 are dropped.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect()
    }
}

/// The worker's only path to the network.
///
/// A non-2xx status is an error: the caller's recovery path (cache
/// lookup, then fallback) is the same for a refused response as for an
/// unreachable network.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    async fn fetch(&self, request: &crate::request::WorkerRequest) -> Result<FetchedResponse, Error>;
}

/// HTTP fetcher backed by reqwest.
pub struct HttpFetcher {
    http: Client,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher from the worker configuration.
    pub fn new(config: &WorkerConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, max_bytes: config.max_bytes })
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, request: &crate::request::WorkerRequest) -> Result<FetchedResponse, Error> {
        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(request.url.to_string())
                } else {
                    Error::HttpError(format!("network error: {e}"))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {e}")))?;

        if bytes.len() > self.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.max_bytes)));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        tracing::debug!("fetched {} -> {} ({} bytes)", request.url, final_url, bytes.len());

        Ok(FetchedResponse { final_url, status, content_type, headers, bytes })
    }
}
