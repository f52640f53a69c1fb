//! Strategy execution: cache-first, network-first, fallback.
//!
//! No error leaves this module as a failure. Network errors fall back to
//! cache, cache read errors count as misses, cache write errors are
//! logged no-ops, and when everything fails a response is synthesized.
//! The one place an error is discarded outright is the detached
//! stale-while-revalidate refresh.

use std::sync::Arc;

use stashway_core::{CachedResponse, cache::request_key};

use crate::fallback;
use crate::fetch::FetchedResponse;
use crate::request::{WorkerRequest, WorkerResponse};
use crate::worker::OfflineWorker;

fn entry_from(request: &WorkerRequest, fetched: &FetchedResponse) -> CachedResponse {
    CachedResponse::new(
        request.key(),
        request.url.to_string(),
        request.method.as_str().to_string(),
        fetched.status.as_u16(),
        fetched.content_type.clone(),
        fetched.header_pairs(),
        fetched.bytes.to_vec(),
    )
}

impl OfflineWorker {
    /// Serve from cache if present, else fetch and populate.
    ///
    /// A hit also spawns a detached refresh of the entry
    /// (stale-while-revalidate); its outcome never reaches the caller.
    pub(crate) async fn cache_first(&self, request: &WorkerRequest) -> WorkerResponse {
        if let Some((entry, store)) = self.lookup(&request.key()).await {
            self.spawn_revalidation(request.clone(), store.clone());
            return WorkerResponse::from_cached(entry, &store);
        }

        match self.fetcher.fetch(request).await {
            Ok(fetched) => {
                // Only declared assets re-enter the static store; other
                // same-origin misses grow the dynamic store.
                let store = if self.policy.is_precached_asset(&request.url) {
                    &self.static_store
                } else {
                    &self.dynamic_store
                };
                self.write_back(store, request, &fetched).await;
                WorkerResponse::from_network(fetched)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "cache-first miss and network failed");
                self.fallback(request).await
            }
        }
    }

    /// Attempt network first, fall back to cache only on failure.
    pub(crate) async fn network_first(&self, request: &WorkerRequest, never_cache: bool) -> WorkerResponse {
        match self.fetcher.fetch(request).await {
            Ok(fetched) => {
                if !never_cache && self.policy.is_dynamically_cacheable(&request.url) {
                    self.write_back(&self.dynamic_store, request, &fetched).await;
                }
                WorkerResponse::from_network(fetched)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network-first fetch failed, trying cache");
                match self.lookup(&request.key()).await {
                    Some((entry, store)) => WorkerResponse::from_cached(entry, &store),
                    None => self.fallback(request).await,
                }
            }
        }
    }

    /// Synthesize a response once network and cache have both failed.
    ///
    /// Infallible: the preferred fallbacks degrade to the generic 503
    /// text response, which needs no I/O.
    pub(crate) async fn fallback(&self, request: &WorkerRequest) -> WorkerResponse {
        if request.accepts_html() {
            // The home document may live in either store: precached in
            // static, or cached dynamically after an online visit.
            let home_key = request_key("GET", self.home_url.as_str());
            if let Some((entry, _)) = self.lookup(&home_key).await {
                return fallback::home_document(entry);
            }
        } else if request.accepts_image() {
            // Redundant safety check: the strategies already missed, but
            // an exact cached copy beats the placeholder.
            if let Some((entry, store)) = self.lookup(&request.key()).await {
                return WorkerResponse::from_cached(entry, &store);
            }
            return fallback::placeholder_image();
        }

        fallback::offline_text()
    }

    /// Static store first, then dynamic. Read errors are logged misses.
    pub(crate) async fn lookup(&self, key: &str) -> Option<(CachedResponse, String)> {
        for store in [&self.static_store, &self.dynamic_store] {
            match self.db.match_entry(store, key).await {
                Ok(Some(entry)) => return Some((entry, store.clone())),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(store = %store, error = %e, "cache read failed, treating as miss")
                }
            }
        }
        None
    }

    /// Cache a fetched response. A write failure is a logged no-op; the
    /// network response is still served.
    pub(crate) async fn write_back(&self, store: &str, request: &WorkerRequest, fetched: &FetchedResponse) {
        let entry = entry_from(request, fetched);
        if let Err(e) = self.db.put_entry(store, &entry).await {
            tracing::warn!(store = %store, url = %request.url, error = %e, "cache write failed");
        }
    }

    /// Detached stale-while-revalidate refresh. Runs after the cached
    /// response has already been returned; every failure is swallowed
    /// after logging, and an existing entry is only ever overwritten by
    /// a fresh success.
    fn spawn_revalidation(&self, request: WorkerRequest, store: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let db = self.db.clone();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(fetched) => {
                    let entry = entry_from(&request, &fetched);
                    if let Err(e) = db.put_entry(&store, &entry).await {
                        tracing::debug!(url = %request.url, error = %e, "background refresh write failed");
                    }
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "background refresh fetch failed")
                }
            }
        });
    }
}
