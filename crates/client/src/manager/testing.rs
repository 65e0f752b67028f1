//! In-memory network and manager builders for strategy tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use lander_core::{CacheDb, Error, PartitionNames};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use url::Url;

use super::{CacheManager, ManagerConfig};
use crate::fetch::{Network, ResourceRequest, ResourceResponse, ResponseSource};

/// Scripted network: routed URLs answer with their response, anything else
/// is a 404, and everything fails while offline.
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, (u16, &'static str, Vec<u8>)>>,
    online: AtomicBool,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            delay: Mutex::new(None),
        }
    }

    pub(crate) fn route(&self, url: &str, status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, content_type, body.into()));
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of fetches attempted so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let routed = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let (status, content_type, body) = routed.unwrap_or((404, "text/plain", b"not found".to_vec()));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Ok(ResourceResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from(body),
            source: ResponseSource::Network,
        })
    }
}

pub(crate) fn test_config() -> ManagerConfig {
    ManagerConfig {
        origin: Url::parse("https://lander.test").unwrap(),
        partitions: PartitionNames::new("lander", "1.0.0"),
        precache: vec!["/".to_string(), "/index.html".to_string()],
        image_max_entries: 50,
        dynamic_max_age: Duration::from_secs(300),
    }
}

pub(crate) fn manager_with_config(db: CacheDb, network: Arc<FakeNetwork>, config: ManagerConfig) -> CacheManager {
    CacheManager::new(db, network, config)
}

/// Fresh manager over an in-memory database, not yet installed.
pub(crate) async fn manager_with(network: Arc<FakeNetwork>) -> CacheManager {
    let db = CacheDb::open_in_memory().await.unwrap();
    manager_with_config(db, network, test_config())
}

/// Manager that already controls requests, with an empty cache.
pub(crate) async fn activated_manager(network: Arc<FakeNetwork>) -> CacheManager {
    let manager = manager_with(network).await;
    manager.activate().await.unwrap();
    manager
}
