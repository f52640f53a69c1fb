//! Synthesized fallback responses.
//!
//! Invoked only when both network and cache lookups have failed. Nothing
//! in this module performs I/O and nothing here can fail: the worker's
//! contract is that the page always receives a response object.

use bytes::Bytes;
use reqwest::StatusCode;
use stashway_core::CachedResponse;

use crate::request::{FallbackKind, ResponseSource, WorkerResponse};

/// Body of the generic offline response.
pub const OFFLINE_MESSAGE: &str = "Sin conexion: el recurso no esta disponible offline.";

/// Fixed-size placeholder served for images that are neither reachable
/// nor cached.
pub const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300">
  <rect width="400" height="300" fill="#e2e8f0"/>
  <text x="200" y="150" font-family="sans-serif" font-size="24" fill="#64748b" text-anchor="middle" dominant-baseline="middle">Offline</text>
</svg>"##;

/// Generic failure response: 503, plain text, fixed offline message.
///
/// The terminal fallback; requires no I/O and cannot fail.
pub fn offline_text() -> WorkerResponse {
    WorkerResponse {
        status: StatusCode::SERVICE_UNAVAILABLE,
        content_type: Some("text/plain".to_string()),
        cache_control: None,
        headers: Vec::new(),
        body: Bytes::from_static(OFFLINE_MESSAGE.as_bytes()),
        source: ResponseSource::Fallback(FallbackKind::Offline),
    }
}

/// Placeholder image response, served with a no-cache directive so a
/// later online request re-fetches the real asset.
pub fn placeholder_image() -> WorkerResponse {
    WorkerResponse {
        status: StatusCode::OK,
        content_type: Some("image/svg+xml".to_string()),
        cache_control: Some("no-cache".to_string()),
        headers: Vec::new(),
        body: Bytes::from_static(PLACEHOLDER_SVG.as_bytes()),
        source: ResponseSource::Fallback(FallbackKind::PlaceholderImage),
    }
}

/// The cached home/landing document, rehydrated as a navigation fallback.
pub fn home_document(entry: CachedResponse) -> WorkerResponse {
    WorkerResponse {
        status: StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
        content_type: entry.content_type,
        cache_control: None,
        headers: entry.headers,
        body: Bytes::from(entry.body),
        source: ResponseSource::Fallback(FallbackKind::HomeDocument),
    }
}
