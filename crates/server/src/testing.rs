//! Stub upstream and manager builder shared by the server tests.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::http::StatusCode;
use lander_client::{CacheManager, ManagerConfig, Network, ResourceRequest, ResourceResponse, ResponseSource};
use lander_core::{CacheDb, Error, PartitionNames};

/// Answers every request with a small HTML page naming the path, unless
/// switched off. Conditional requests get an empty 304, as a real origin
/// would answer a browser holding a validator.
pub(crate) struct Upstream {
    online: AtomicBool,
    seen: Mutex<Vec<String>>,
}

impl Upstream {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self { online: AtomicBool::new(true), seen: Mutex::new(Vec::new()) })
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Every URL fetched so far, in order.
    pub(crate) fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Network for Upstream {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, Error> {
        self.seen.lock().unwrap().push(request.url.to_string());

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        if request.header("if-none-match").is_some() || request.header("if-modified-since").is_some() {
            let mut resp = ResourceResponse::synthetic(StatusCode::NOT_MODIFIED, "text/html", "");
            resp.source = ResponseSource::Network;
            return Ok(resp);
        }

        let body = format!("<p>{}</p>", request.url.path());
        let mut resp = ResourceResponse::synthetic(StatusCode::OK, "text/html", body);
        resp.source = ResponseSource::Network;
        Ok(resp)
    }
}

/// Installed and activated manager for `https://lander.test`.
pub(crate) async fn activated_manager(upstream: Arc<Upstream>) -> Arc<CacheManager> {
    let db = CacheDb::open_in_memory().await.unwrap();
    let config = ManagerConfig {
        origin: url::Url::parse("https://lander.test").unwrap(),
        partitions: PartitionNames::new("lander", "1.0.0"),
        precache: vec!["/".to_string()],
        image_max_entries: 50,
        dynamic_max_age: Duration::from_secs(300),
    };

    let manager = Arc::new(CacheManager::new(db, upstream, config));
    manager.install().await;
    manager.activate().await.unwrap();
    manager
}
