//! stashway gateway entry point.
//!
//! Boots an offline cache worker against the configured site, runs the
//! install/activate lifecycle, then routes the URLs given on the command
//! line through it and reports where each response came from. Useful for
//! warming a cache ahead of going offline and for poking at the routing
//! policy from a shell.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use stashway_core::{CacheDb, WorkerConfig};
use stashway_worker::{HttpFetcher, OfflineWorker, ResponseSource, WorkerRequest};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = WorkerConfig::load().context("loading configuration")?;
    let db = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let fetcher = Arc::new(HttpFetcher::new(&config)?);

    let worker = OfflineWorker::new(config, db, fetcher)?;

    tracing::info!("installing worker");
    worker.install().await.context("install failed")?;
    worker.activate().await.context("activate failed")?;

    for url in std::env::args().skip(1) {
        let request = match WorkerRequest::get(&url) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("{url}: {e}");
                continue;
            }
        };

        let response = worker.handle_fetch(&request).await;
        let source = match &response.source {
            ResponseSource::Network => "network".to_string(),
            ResponseSource::Cache(store) => format!("cache ({store})"),
            ResponseSource::Fallback(kind) => format!("fallback ({kind:?})"),
            ResponseSource::PassThrough => "pass-through".to_string(),
        };
        println!("{} {} {} bytes <- {}", response.status.as_u16(), url, response.body.len(), source);
    }

    Ok(())
}
