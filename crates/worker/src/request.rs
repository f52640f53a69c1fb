//! Request/response model for the worker, with URL canonicalization.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! Non-http(s) schemes are parsed but left untouched; the worker passes
//! those requests through without interception.

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use stashway_core::{CachedResponse, Error, cache::request_key};
use url::Url;

/// Canonicalize a URL string for consistent cache keys.
pub fn canonicalize(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".to_string()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    if matches!(parsed.scheme(), "http" | "https") {
        if let Some(host) = parsed.host_str() {
            let lowered = host.to_lowercase();
            parsed
                .set_host(Some(&lowered))
                .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        }
        parsed.set_fragment(None);
    }

    Ok(parsed)
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub method: Method,
    pub url: Url,
    /// Value of the Accept header, used only for fallback selection.
    pub accept: Option<String>,
}

impl WorkerRequest {
    /// Build a request from parts, canonicalizing the URL.
    pub fn new(method: Method, url: &str, accept: Option<&str>) -> Result<Self, Error> {
        Ok(Self { method, url: canonicalize(url)?, accept: accept.map(|s| s.to_string()) })
    }

    /// Convenience constructor for a plain GET.
    pub fn get(url: &str) -> Result<Self, Error> {
        Self::new(Method::GET, url, None)
    }

    /// The opaque cache key for this request.
    pub fn key(&self) -> String {
        request_key(self.method.as_str(), self.url.as_str())
    }

    /// Side-effect-free methods are the only ones the worker intercepts.
    pub fn is_read_only(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD)
    }

    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    pub fn accepts_html(&self) -> bool {
        self.accept.as_deref().is_some_and(|a| a.contains("text/html"))
    }

    pub fn accepts_image(&self) -> bool {
        self.accept.as_deref().is_some_and(|a| a.contains("image/"))
    }
}

/// Which fallback variant answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// Last cached copy of the home/landing document.
    HomeDocument,
    /// Synthesized inline SVG with an "offline" label.
    PlaceholderImage,
    /// Generic 503 plain-text offline message.
    Offline,
}

/// Where a response came from.
///
/// Observability tag for logs and tests; not part of the bytes handed
/// back to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    /// Served from the named cache store.
    Cache(String),
    Fallback(FallbackKind),
    /// Not intercepted; the host performs the request itself.
    PassThrough,
}

/// The response handed back to the hosting page.
#[derive(Debug, Clone)]
pub struct WorkerResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl WorkerResponse {
    /// Marker response for requests the worker does not intercept.
    pub fn pass_through() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            cache_control: None,
            headers: Vec::new(),
            body: Bytes::new(),
            source: ResponseSource::PassThrough,
        }
    }

    /// Wrap a fresh network response.
    pub fn from_network(fetched: crate::fetch::FetchedResponse) -> Self {
        let headers = fetched.header_pairs();
        Self {
            status: fetched.status,
            content_type: fetched.content_type,
            cache_control: None,
            headers,
            body: fetched.bytes,
            source: ResponseSource::Network,
        }
    }

    /// Rehydrate a response from a cache entry.
    pub fn from_cached(entry: CachedResponse, store: &str) -> Self {
        Self {
            status: StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
            content_type: entry.content_type,
            cache_control: None,
            headers: entry.headers,
            body: Bytes::from(entry.body),
            source: ResponseSource::Cache(store.to_string()),
        }
    }
}
