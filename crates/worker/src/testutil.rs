//! Scripted network fetchers and worker builders for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, header};
use stashway_core::{CacheDb, Error, WorkerConfig};

use crate::fetch::{FetchedResponse, NetworkFetcher};
use crate::request::WorkerRequest;
use crate::worker::OfflineWorker;

#[derive(Clone)]
struct ScriptedResponse {
    content_type: String,
    body: Vec<u8>,
}

/// A fetcher that serves scripted responses and records every call.
///
/// URLs without a script entry behave as an unreachable network.
pub(crate) struct ScriptedFetcher {
    routes: Mutex<HashMap<String, ScriptedResponse>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { routes: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()) })
    }

    /// Script a 200 response for a URL.
    pub fn script(&self, url: &str, content_type: &str, body: &[u8]) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            ScriptedResponse { content_type: content_type.to_string(), body: body.to_vec() },
        );
    }

    /// Make one URL unreachable.
    pub fn unscript(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    /// Take the whole network down.
    pub fn unscript_all(&self) {
        self.routes.lock().unwrap().clear();
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl NetworkFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &WorkerRequest) -> Result<FetchedResponse, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        let scripted = self.routes.lock().unwrap().get(&url).cloned();
        match scripted {
            Some(response) => Ok(FetchedResponse {
                final_url: request.url.clone(),
                status: StatusCode::OK,
                content_type: Some(response.content_type),
                headers: header::HeaderMap::new(),
                bytes: Bytes::from(response.body),
            }),
            None => Err(Error::HttpError(format!("scripted network unreachable: {url}"))),
        }
    }
}

/// Worker configuration used across the scenario tests.
pub(crate) fn test_config() -> WorkerConfig {
    WorkerConfig {
        origin: "https://protocolos.test".into(),
        precache_assets: vec![
            "/".into(),
            "/index.html".into(),
            "/css/styles.css".into(),
            "/js/app.js".into(),
        ],
        home_document: "/index.html".into(),
        network_first_patterns: vec![r"googleapis\.com".into(), r"/api/".into()],
        ..Default::default()
    }
}

/// Script a 200 response for every precache asset of [`test_config`].
pub(crate) fn script_precache(fetcher: &ScriptedFetcher) {
    for path in test_config().precache_assets {
        let url = format!("https://protocolos.test{path}");
        let content_type = if path.ends_with(".css") {
            "text/css"
        } else if path.ends_with(".js") {
            "text/javascript"
        } else {
            "text/html"
        };
        fetcher.script(&url, content_type, format!("body of {path}").as_bytes());
    }
}

/// Build a worker over an in-memory database with [`test_config`].
pub(crate) async fn test_worker(fetcher: Arc<ScriptedFetcher>) -> OfflineWorker {
    let db = CacheDb::open_in_memory().await.unwrap();
    OfflineWorker::new(test_config(), db, fetcher).unwrap()
}
