//! The offline cache worker: lifecycle, fetch dispatch, maintenance.
//!
//! One `OfflineWorker` is built per configuration; independent instances
//! (different store prefixes or versions) can share a database. The host
//! environment drives the lifecycle: `install` then `activate`, then
//! `handle_fetch` per intercepted request until a newer version takes
//! over.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use url::Url;

use stashway_core::{CacheDb, CachedResponse, Error, StoreKind, WorkerConfig};

use crate::fetch::NetworkFetcher;
use crate::policy::{RoutingPolicy, Strategy};
use crate::request::{WorkerRequest, WorkerResponse, canonicalize};

/// Host-driven lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built but not yet installed.
    New,
    /// Precaching the critical-asset list.
    Installing,
    /// Installed; waiting to take over from a previous version.
    Waiting,
    /// Steady state; handling fetches.
    Active,
}

/// The offline cache controller.
pub struct OfflineWorker {
    pub(crate) config: WorkerConfig,
    pub(crate) db: CacheDb,
    pub(crate) fetcher: Arc<dyn NetworkFetcher>,
    pub(crate) policy: RoutingPolicy,
    pub(crate) static_store: String,
    pub(crate) dynamic_store: String,
    pub(crate) origin: Url,
    pub(crate) home_url: Url,
    state: Mutex<LifecycleState>,
    last_cleanup: Mutex<Option<Instant>>,
}

impl OfflineWorker {
    /// Build a worker from explicit configuration.
    ///
    /// # Errors
    ///
    /// Fails if the routing patterns don't compile or the origin/home
    /// document paths don't form valid URLs.
    pub fn new(config: WorkerConfig, db: CacheDb, fetcher: Arc<dyn NetworkFetcher>) -> Result<Self, Error> {
        let policy = RoutingPolicy::from_config(&config)?;
        let origin = canonicalize(&config.origin)?;
        let home_url = policy.home_document_url(&config)?;
        let static_store = config.static_store_name();
        let dynamic_store = config.dynamic_store_name();

        Ok(Self {
            config,
            db,
            fetcher,
            policy,
            static_store,
            dynamic_store,
            origin,
            home_url,
            state: Mutex::new(LifecycleState::New),
            last_cleanup: Mutex::new(None),
        })
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Install: populate the static store with the critical-asset list.
    ///
    /// All-or-nothing. If any asset fails to fetch the attempt returns
    /// `InstallFailed` and no write happens; the host's retry governs
    /// recovery. Re-delivery after success is a harmless re-upsert.
    pub async fn install(&self) -> Result<(), Error> {
        *self.state.lock().await = LifecycleState::Installing;

        match self.precache_all().await {
            Ok(count) => {
                *self.state.lock().await = LifecycleState::Waiting;
                tracing::info!(store = %self.static_store, assets = count, "install complete");
                Ok(())
            }
            Err(e) => {
                *self.state.lock().await = LifecycleState::New;
                Err(e)
            }
        }
    }

    async fn precache_all(&self) -> Result<usize, Error> {
        let mut batch = Vec::with_capacity(self.config.precache_assets.len());

        for path in &self.config.precache_assets {
            let url = self
                .origin
                .join(path)
                .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
            let request = WorkerRequest::get(url.as_str())?;

            let fetched = self.fetcher.fetch(&request).await.map_err(|e| {
                tracing::warn!(asset = %url, error = %e, "precache fetch failed, aborting install");
                Error::InstallFailed(format!("{url}: {e}"))
            })?;

            batch.push(CachedResponse::new(
                request.key(),
                url.to_string(),
                request.method.as_str().to_string(),
                fetched.status.as_u16(),
                fetched.content_type.clone(),
                fetched.header_pairs(),
                fetched.bytes.to_vec(),
            ));
        }

        let count = batch.len();
        self.db.open_store(&self.static_store, StoreKind::Static).await?;
        // One transaction: a partial static store is never observable.
        self.db.put_entries(&self.static_store, batch).await?;
        Ok(count)
    }

    /// Activate: delete stores from superseded versions, create the
    /// current pair, and start handling fetches. Idempotent.
    pub async fn activate(&self) -> Result<(), Error> {
        for name in self.db.list_stores(&self.config.cache_prefix).await? {
            if name != self.static_store && name != self.dynamic_store {
                tracing::info!(store = %name, "deleting superseded cache store");
                self.db.delete_store(&name).await?;
            }
        }

        self.db.open_store(&self.static_store, StoreKind::Static).await?;
        self.db.open_store(&self.dynamic_store, StoreKind::Dynamic).await?;

        *self.state.lock().await = LifecycleState::Active;
        tracing::info!(version = %self.config.cache_version, "worker active");
        Ok(())
    }

    /// Handle one intercepted request. Never fails: every network or
    /// storage error resolves to a cache hit or a synthesized fallback.
    pub async fn handle_fetch(&self, request: &WorkerRequest) -> WorkerResponse {
        if !request.is_read_only() || !request.is_http() {
            return WorkerResponse::pass_through();
        }

        self.maybe_spawn_maintenance().await;

        let classification = self.policy.classify(&request.url);
        tracing::debug!(url = %request.url, ?classification, "classified request");

        match classification.strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request, classification.never_cache).await,
        }
    }

    /// Opportunistic maintenance: at most one detached trim pass per
    /// cleanup interval, triggered from the fetch path. The worker
    /// process is not long-lived, so there is no interval timer.
    async fn maybe_spawn_maintenance(&self) {
        let mut last = self.last_cleanup.lock().await;
        let due = last.is_none_or(|at| at.elapsed() >= self.config.cleanup_interval());
        if !due {
            return;
        }
        *last = Some(Instant::now());
        drop(last);

        let db = self.db.clone();
        let store = self.dynamic_store.clone();
        let ceiling = self.config.dynamic_ceiling;
        let batch = self.config.evict_batch;
        tokio::spawn(async move {
            match Self::trim_dynamic_store(&db, &store, ceiling, batch).await {
                Ok(0) => {}
                Ok(evicted) => tracing::debug!(store = %store, evicted, "trimmed dynamic store"),
                Err(e) => tracing::warn!(store = %store, error = %e, "dynamic store maintenance failed"),
            }
        });
    }

    /// Run one maintenance pass synchronously.
    pub async fn run_maintenance(&self) -> Result<u64, Error> {
        Self::trim_dynamic_store(&self.db, &self.dynamic_store, self.config.dynamic_ceiling, self.config.evict_batch)
            .await
    }

    async fn trim_dynamic_store(db: &CacheDb, store: &str, ceiling: u64, batch: u64) -> Result<u64, Error> {
        let mut evicted = 0;
        while db.entry_count(store).await? > ceiling {
            let removed = db.evict_oldest(store, batch).await?;
            if removed == 0 {
                break;
            }
            evicted += removed;
        }
        Ok(evicted)
    }

    /// Promote a waiting worker to active immediately.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        if self.state().await == LifecycleState::Waiting {
            self.activate().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{FallbackKind, ResponseSource};
    use crate::testutil::{ScriptedFetcher, script_precache, test_config, test_worker};
    use reqwest::{Method, StatusCode};
    use stashway_core::cache::request_key;

    #[tokio::test]
    async fn test_install_precaches_all_assets() {
        let fetcher = ScriptedFetcher::new();
        script_precache(&fetcher);
        let worker = test_worker(Arc::clone(&fetcher)).await;

        worker.install().await.unwrap();

        assert_eq!(worker.state().await, LifecycleState::Waiting);
        let count = worker.db.entry_count(&worker.static_store).await.unwrap();
        assert_eq!(count as usize, test_config().precache_assets.len());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let fetcher = ScriptedFetcher::new();
        script_precache(&fetcher);
        // One critical asset is unreachable.
        fetcher.unscript("https://protocolos.test/js/app.js");
        let worker = test_worker(Arc::clone(&fetcher)).await;

        let result = worker.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(worker.state().await, LifecycleState::New);

        // No partial static store was promoted.
        worker.db.open_store(&worker.static_store, StoreKind::Static).await.unwrap();
        assert_eq!(worker.db.entry_count(&worker.static_store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_activation_deletes_superseded_stores() {
        let fetcher = ScriptedFetcher::new();
        script_precache(&fetcher);
        let db = CacheDb::open_in_memory().await.unwrap();

        // Stores left behind by a v1 worker.
        db.open_store("stashway-v1-static", StoreKind::Static).await.unwrap();
        db.open_store("stashway-v1-dynamic", StoreKind::Dynamic).await.unwrap();

        let config = WorkerConfig { cache_version: "v2".into(), ..test_config() };
        let worker = OfflineWorker::new(config, db.clone(), fetcher).unwrap();
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let mut stores = db.list_stores("stashway").await.unwrap();
        stores.sort();
        assert_eq!(stores, vec!["stashway-v2-dynamic".to_string(), "stashway-v2-static".to_string()]);
        assert_eq!(worker.state().await, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_activation_is_idempotent() {
        let fetcher = ScriptedFetcher::new();
        script_precache(&fetcher);
        let worker = test_worker(fetcher).await;
        worker.install().await.unwrap();

        worker.activate().await.unwrap();
        worker.activate().await.unwrap();

        // The static store survived the second activation intact.
        let count = worker.db.entry_count(&worker.static_store).await.unwrap();
        assert_eq!(count as usize, test_config().precache_assets.len());
    }

    #[tokio::test]
    async fn test_precached_asset_served_without_network() {
        let fetcher = ScriptedFetcher::new();
        script_precache(&fetcher);
        let worker = test_worker(Arc::clone(&fetcher)).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        // Network goes away entirely; the asset must still be served.
        fetcher.unscript_all();

        let request = WorkerRequest::get("https://protocolos.test/css/styles.css").unwrap();
        let response = worker.handle_fetch(&request).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.source, ResponseSource::Cache(worker.static_store.clone()));
        assert_eq!(&response.body[..], b"body of /css/styles.css");
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let fetcher = ScriptedFetcher::new();
        let worker = test_worker(Arc::clone(&fetcher)).await;
        worker.activate().await.unwrap();

        let request = WorkerRequest::new(Method::POST, "https://protocolos.test/form", None).unwrap();
        let response = worker.handle_fetch(&request).await;

        assert_eq!(response.source, ResponseSource::PassThrough);
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_non_http_scheme_passes_through() {
        let fetcher = ScriptedFetcher::new();
        let worker = test_worker(Arc::clone(&fetcher)).await;
        worker.activate().await.unwrap();

        let request = WorkerRequest::get("chrome-extension://abcdef/content.js").unwrap();
        let response = worker.handle_fetch(&request).await;

        assert_eq!(response.source, ResponseSource::PassThrough);
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_maintenance_trims_fifo_over_ceiling() {
        let fetcher = ScriptedFetcher::new();
        let worker = test_worker(fetcher).await;
        worker.activate().await.unwrap();

        for i in 0..51 {
            let url = format!("https://cdn.example.net/asset-{i}.js");
            let entry = CachedResponse::new(
                request_key("GET", &url),
                url,
                "GET".into(),
                200,
                Some("text/javascript".into()),
                Vec::new(),
                b"x".to_vec(),
            );
            worker.db.put_entry(&worker.dynamic_store, &entry).await.unwrap();
        }

        let evicted = worker.run_maintenance().await.unwrap();
        assert_eq!(evicted, 10);
        assert_eq!(worker.db.entry_count(&worker.dynamic_store).await.unwrap(), 41);

        // The ten earliest-inserted entries are gone, the rest remain.
        let key_oldest = request_key("GET", "https://cdn.example.net/asset-0.js");
        let key_tenth = request_key("GET", "https://cdn.example.net/asset-10.js");
        assert!(worker.db.match_entry(&worker.dynamic_store, &key_oldest).await.unwrap().is_none());
        assert!(worker.db.match_entry(&worker.dynamic_store, &key_tenth).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_maintenance_trims_far_past_ceiling_in_one_pass() {
        let fetcher = ScriptedFetcher::new();
        let worker = test_worker(fetcher).await;
        worker.activate().await.unwrap();

        // A store that grew well past the ceiling between passes.
        for i in 0..75 {
            let url = format!("https://cdn.example.net/asset-{i}.js");
            let entry = CachedResponse::new(
                request_key("GET", &url),
                url,
                "GET".into(),
                200,
                Some("text/javascript".into()),
                Vec::new(),
                b"x".to_vec(),
            );
            worker.db.put_entry(&worker.dynamic_store, &entry).await.unwrap();
        }

        // Batches of 10 repeat until the count is back under the ceiling.
        let evicted = worker.run_maintenance().await.unwrap();
        assert_eq!(evicted, 30);
        assert_eq!(worker.db.entry_count(&worker.dynamic_store).await.unwrap(), 45);
    }

    #[tokio::test]
    async fn test_maintenance_noop_below_ceiling() {
        let fetcher = ScriptedFetcher::new();
        let worker = test_worker(fetcher).await;
        worker.activate().await.unwrap();

        assert_eq!(worker.run_maintenance().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_static_store_never_auto_evicted() {
        let fetcher = ScriptedFetcher::new();
        script_precache(&fetcher);
        let worker = test_worker(fetcher).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        worker.run_maintenance().await.unwrap();

        let count = worker.db.entry_count(&worker.static_store).await.unwrap();
        assert_eq!(count as usize, test_config().precache_assets.len());
    }

    #[tokio::test]
    async fn test_offline_uncached_html_gets_503_text() {
        let fetcher = ScriptedFetcher::new();
        // No install: nothing cached, nothing reachable.
        let worker = test_worker(fetcher).await;
        worker.activate().await.unwrap();

        let request =
            WorkerRequest::new(Method::GET, "https://protocolos.test/Inicio.html", Some("text/html,*/*")).unwrap();
        let response = worker.handle_fetch(&request).await;

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.content_type.as_deref(), Some("text/plain"));
        assert_eq!(response.source, ResponseSource::Fallback(FallbackKind::Offline));
    }
}
