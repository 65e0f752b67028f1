//! The four caching strategies.
//!
//! Storage errors never fail a request: a failed read counts as a miss and a
//! failed write is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use lander_core::{CacheDb, CacheEntry, Error};

use super::CacheManager;
use super::classify::AssetKind;
use super::fallback;
use crate::fetch::{Network, ResourceRequest, ResourceResponse, ResponseSource};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether a dynamic entry may stand in for a failed fetch at `now`.
///
/// Entries written without a timestamp carry no age and are always usable.
pub(crate) fn is_fresh(written_at: Option<i64>, now: i64, max_age: Duration) -> bool {
    match written_at {
        None => true,
        Some(t) => now.saturating_sub(t) < max_age.as_millis() as i64,
    }
}

async fn lookup(db: &CacheDb, partition: &str, key: &str) -> Option<CacheEntry> {
    match db.get_entry(partition, key).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(partition, key, error = %e, "cache read failed, treating as miss");
            None
        }
    }
}

fn from_entry(entry: CacheEntry) -> Option<ResourceResponse> {
    match ResourceResponse::from_record(entry.response, ResponseSource::Cache) {
        Ok(resp) => Some(resp),
        Err(e) => {
            tracing::warn!(key = %entry.key, error = %e, "unreadable cache entry, treating as miss");
            None
        }
    }
}

async fn store(db: &CacheDb, partition: &str, key: &str, response: &ResourceResponse, written_at: Option<i64>) {
    if let Err(e) = db.put_entry(partition, key, &response.to_record(), written_at).await {
        tracing::warn!(partition, key, error = %e, "cache write failed");
    }
}

/// Background refresh of a cached image; the oldest entries are evicted first.
async fn refresh_image(
    db: &CacheDb, network: &dyn Network, request: &ResourceRequest, partition: &str, key: &str, max_entries: usize,
) -> Result<ResourceResponse, Error> {
    let response = network.fetch(request).await?;
    if response.is_ok() {
        let evicted = db.put_entry_capped(partition, key, &response.to_record(), max_entries).await?;
        if evicted > 0 {
            tracing::debug!(evicted, partition, "evicted oldest images");
        }
    }
    Ok(response)
}

impl CacheManager {
    /// Images: serve from cache and refresh in the background, or fetch and
    /// store. Falls back to the SVG placeholder.
    pub(crate) async fn stale_while_revalidate(&self, request: &ResourceRequest, key: &str) -> ResourceResponse {
        let partition = &self.config.partitions.images;
        let max_entries = self.config.image_max_entries;

        if let Some(cached) = lookup(&self.db, partition, key).await.and_then(from_entry) {
            tracing::debug!("image cache hit for {}", key);

            let db = self.db.clone();
            let network = Arc::clone(&self.network);
            let request = request.clone();
            let partition = partition.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                match refresh_image(&db, network.as_ref(), &request, &partition, &key, max_entries).await {
                    Ok(resp) if !resp.is_ok() => {
                        tracing::debug!("background refresh of {} got {}", key, resp.status.as_u16())
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("background refresh of {} failed: {}", key, e),
                }
            });

            return cached;
        }

        match self.network.fetch(request).await {
            Ok(resp) if resp.is_ok() => {
                match self.db.put_entry_capped(partition, key, &resp.to_record(), max_entries).await {
                    Ok(evicted) if evicted > 0 => tracing::debug!(evicted, partition = %partition, "evicted oldest images"),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(partition = %partition, key, error = %e, "cache write failed"),
                }
                resp
            }
            Ok(resp) => {
                tracing::debug!("image {} returned {}, using placeholder", key, resp.status.as_u16());
                fallback::image_placeholder()
            }
            Err(e) => {
                tracing::debug!("image {} unavailable: {}", key, e);
                fallback::image_placeholder()
            }
        }
    }

    /// Documents: network first, then the stored copy, then the offline page.
    pub(crate) async fn network_first_document(&self, request: &ResourceRequest, key: &str) -> ResourceResponse {
        let partition = &self.config.partitions.dynamic;

        match self.network.fetch(request).await {
            Ok(resp) if resp.is_ok() => {
                store(&self.db, partition, key, &resp, None).await;
                return resp;
            }
            Ok(resp) => tracing::debug!("document {} returned {}, trying cache", key, resp.status.as_u16()),
            Err(e) => tracing::debug!("document {} unavailable: {}, trying cache", key, e),
        }

        if let Some(cached) = lookup(&self.db, partition, key).await.and_then(from_entry) {
            return cached;
        }

        // the install-time shell lives in the static partition
        if let Some(cached) = lookup(&self.db, &self.config.partitions.static_assets, key)
            .await
            .and_then(from_entry)
        {
            return cached;
        }

        fallback::offline_page()
    }

    /// Static assets: cache first, then network, then an inert stand-in.
    pub(crate) async fn cache_first(&self, request: &ResourceRequest, key: &str, kind: AssetKind) -> ResourceResponse {
        let partition = &self.config.partitions.static_assets;

        if let Some(cached) = lookup(&self.db, partition, key).await.and_then(from_entry) {
            tracing::debug!("static cache hit for {}", key);
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(resp) if resp.is_ok() => {
                store(&self.db, partition, key, &resp, None).await;
                resp
            }
            Ok(resp) => {
                tracing::debug!("asset {} returned {}, using fallback", key, resp.status.as_u16());
                fallback::static_asset(kind)
            }
            Err(e) => {
                tracing::debug!("asset {} unavailable: {}", key, e);
                fallback::static_asset(kind)
            }
        }
    }

    /// Other dynamic content: network first, stamped copies within the
    /// freshness window on failure, otherwise the network error.
    pub(crate) async fn network_first_dynamic(
        &self, request: &ResourceRequest, key: &str,
    ) -> Result<ResourceResponse, Error> {
        let partition = &self.config.partitions.dynamic;

        let err = match self.network.fetch(request).await {
            Ok(resp) => {
                if resp.is_ok() {
                    store(&self.db, partition, key, &resp, Some(now_millis())).await;
                }
                return Ok(resp);
            }
            Err(e) => e,
        };

        match lookup(&self.db, partition, key).await {
            Some(entry) if is_fresh(entry.written_at, now_millis(), self.config.dynamic_max_age) => {
                if let Some(cached) = from_entry(entry) {
                    tracing::debug!("serving cached {} after network failure", key);
                    return Ok(cached);
                }
            }
            Some(_) => tracing::debug!("cached {} is older than {:?}", key, self.config.dynamic_max_age),
            None => {}
        }

        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{FakeNetwork, activated_manager, manager_with};
    use super::*;
    use lander_core::ResponseRecord;
    use reqwest::StatusCode;
    use reqwest::header::ACCEPT;
    use url::Url;

    const FIVE_MINUTES: Duration = Duration::from_secs(300);

    fn url(path: &str) -> Url {
        Url::parse("https://lander.test").unwrap().join(path).unwrap()
    }

    fn document(path: &str) -> ResourceRequest {
        ResourceRequest::get(url(path)).with_header(ACCEPT, "text/html,application/xhtml+xml")
    }

    #[test]
    fn test_is_fresh_boundary() {
        let written = 1_000_000;
        assert!(is_fresh(Some(written), written + 299_000, FIVE_MINUTES));
        assert!(!is_fresh(Some(written), written + 300_000, FIVE_MINUTES));
        assert!(!is_fresh(Some(written), written + 301_000, FIVE_MINUTES));
        assert!(is_fresh(None, i64::MAX, FIVE_MINUTES));
    }

    #[tokio::test]
    async fn test_image_miss_fetches_and_stores() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/hero.png").as_str(), 200, "image/png", "png-bytes");
        let manager = activated_manager(network.clone()).await;

        let resp = manager.handle(ResourceRequest::get(url("/hero.png"))).await.unwrap();

        assert_eq!(resp.source, ResponseSource::Network);
        assert_eq!(resp.body.as_ref(), b"png-bytes");
        let images = &manager.config().partitions.images;
        assert!(manager.db().get_entry(images, url("/hero.png").as_str()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_image_hit_returns_without_waiting_for_network() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/hero.png").as_str(), 200, "image/png", "v1");
        let manager = activated_manager(network.clone()).await;
        manager.handle(ResourceRequest::get(url("/hero.png"))).await.unwrap();

        network.set_delay(Duration::from_secs(30));
        let resp = tokio::time::timeout(Duration::from_secs(2), manager.handle(ResourceRequest::get(url("/hero.png"))))
            .await
            .expect("cached image must not wait on the network")
            .unwrap();

        assert_eq!(resp.source, ResponseSource::Cache);
        assert_eq!(resp.body.as_ref(), b"v1");
    }

    #[tokio::test]
    async fn test_image_hit_refreshes_in_background() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/hero.png").as_str(), 200, "image/png", "v1");
        let manager = activated_manager(network.clone()).await;
        manager.handle(ResourceRequest::get(url("/hero.png"))).await.unwrap();

        network.route(url("/hero.png").as_str(), 200, "image/png", "v2");
        let resp = manager.handle(ResourceRequest::get(url("/hero.png"))).await.unwrap();
        assert_eq!(resp.body.as_ref(), b"v1");

        let images = manager.config().partitions.images.clone();
        let key = url("/hero.png").to_string();
        let mut refreshed = false;
        for _ in 0..100 {
            let entry = manager.db().get_entry(&images, &key).await.unwrap().unwrap();
            if entry.response.body == b"v2" {
                refreshed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(refreshed);
    }

    #[tokio::test]
    async fn test_image_hit_survives_failed_refresh() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/hero.png").as_str(), 200, "image/png", "v1");
        let manager = activated_manager(network.clone()).await;
        manager.handle(ResourceRequest::get(url("/hero.png"))).await.unwrap();

        network.set_online(false);
        let resp = manager.handle(ResourceRequest::get(url("/hero.png"))).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Cache);
        assert_eq!(resp.body.as_ref(), b"v1");
    }

    #[tokio::test]
    async fn test_image_offline_miss_gets_placeholder_and_is_not_cached() {
        let network = Arc::new(FakeNetwork::new());
        network.set_online(false);
        let manager = activated_manager(network.clone()).await;

        let resp = manager.handle(ResourceRequest::get(url("/new.webp"))).await.unwrap();

        assert_eq!(resp.source, ResponseSource::Fallback);
        assert_eq!(resp.content_type(), Some("image/svg+xml"));
        let images = &manager.config().partitions.images;
        assert_eq!(manager.db().count_entries(images).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_image_not_found_gets_placeholder() {
        let network = Arc::new(FakeNetwork::new());
        let manager = activated_manager(network.clone()).await;

        let resp = manager.handle(ResourceRequest::get(url("/missing.jpg"))).await.unwrap();
        assert_eq!(resp.content_type(), Some("image/svg+xml"));
        let images = &manager.config().partitions.images;
        assert_eq!(manager.db().count_entries(images).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_image_partition_is_capped() {
        let network = Arc::new(FakeNetwork::new());
        for i in 0..60 {
            network.route(url(&format!("/gallery/{i}.jpg")).as_str(), 200, "image/jpeg", "jpg");
        }
        let manager = activated_manager(network.clone()).await;
        let images = manager.config().partitions.images.clone();

        for i in 0..60 {
            manager
                .handle(ResourceRequest::get(url(&format!("/gallery/{i}.jpg"))))
                .await
                .unwrap();
            assert!(manager.db().count_entries(&images).await.unwrap() <= 50);
        }

        assert_eq!(manager.db().count_entries(&images).await.unwrap(), 50);
        for i in 0..10 {
            let key = url(&format!("/gallery/{i}.jpg")).to_string();
            assert!(manager.db().get_entry(&images, &key).await.unwrap().is_none(), "{key} should be evicted");
        }
        let newest = url("/gallery/59.jpg").to_string();
        assert!(manager.db().get_entry(&images, &newest).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_document_prefers_network_and_overwrites_cache() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/").as_str(), 200, "text/html", "<p>v1</p>");
        let manager = activated_manager(network.clone()).await;
        let dynamic = manager.config().partitions.dynamic.clone();

        let first = manager.handle(document("/")).await.unwrap();
        assert_eq!(first.body.as_ref(), b"<p>v1</p>");
        assert!(manager.db().get_entry(&dynamic, url("/").as_str()).await.unwrap().is_some());

        network.route(url("/").as_str(), 200, "text/html", "<p>v2</p>");
        let second = manager.handle(document("/")).await.unwrap();
        assert_eq!(second.source, ResponseSource::Network);
        assert_eq!(second.body.as_ref(), b"<p>v2</p>");

        let entry = manager.db().get_entry(&dynamic, url("/").as_str()).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"<p>v2</p>".to_vec());
        assert_eq!(entry.written_at, None);
    }

    #[tokio::test]
    async fn test_document_offline_serves_previous_visit() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/").as_str(), 200, "text/html", "<p>lander</p>");
        let manager = activated_manager(network.clone()).await;
        manager.handle(document("/")).await.unwrap();

        network.set_online(false);
        let resp = manager.handle(document("/")).await.unwrap();

        assert_eq!(resp.source, ResponseSource::Cache);
        assert_eq!(resp.body.as_ref(), b"<p>lander</p>");
    }

    #[tokio::test]
    async fn test_document_server_error_serves_cached_copy() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/").as_str(), 200, "text/html", "<p>good</p>");
        let manager = activated_manager(network.clone()).await;
        manager.handle(document("/")).await.unwrap();

        network.route(url("/").as_str(), 503, "text/html", "maintenance");
        let resp = manager.handle(document("/")).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Cache);
        assert_eq!(resp.body.as_ref(), b"<p>good</p>");
    }

    #[tokio::test]
    async fn test_document_offline_without_cache_gets_offline_page() {
        let network = Arc::new(FakeNetwork::new());
        network.set_online(false);
        let manager = activated_manager(network.clone()).await;

        let resp = manager.handle(document("/thank-you")).await.unwrap();

        assert_eq!(resp.source, ResponseSource::Fallback);
        assert!(resp.content_type().unwrap().starts_with("text/html"));
        assert!(std::str::from_utf8(&resp.body).unwrap().contains("You're offline"));
    }

    #[tokio::test]
    async fn test_document_offline_uses_prewarmed_shell() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/").as_str(), 200, "text/html", "<p>shell</p>");
        network.route(url("/index.html").as_str(), 200, "text/html", "<p>shell</p>");
        let manager = manager_with(network.clone()).await;
        manager.install().await;
        manager.activate().await.unwrap();

        network.set_online(false);
        let resp = manager.handle(document("/index.html")).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Cache);
        assert_eq!(resp.body.as_ref(), b"<p>shell</p>");
    }

    #[tokio::test]
    async fn test_static_cache_hit_skips_network() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/styles.css").as_str(), 200, "text/css", "body{color:red}");
        let manager = activated_manager(network.clone()).await;

        manager.handle(ResourceRequest::get(url("/styles.css"))).await.unwrap();
        assert_eq!(network.calls(), 1);

        network.set_online(false);
        let resp = manager.handle(ResourceRequest::get(url("/styles.css"))).await.unwrap();

        assert_eq!(network.calls(), 1);
        assert_eq!(resp.source, ResponseSource::Cache);
        assert_eq!(resp.body.as_ref(), b"body{color:red}");
    }

    #[tokio::test]
    async fn test_static_offline_fallbacks() {
        let network = Arc::new(FakeNetwork::new());
        network.set_online(false);
        let manager = activated_manager(network.clone()).await;

        let css = manager.handle(ResourceRequest::get(url("/theme.css"))).await.unwrap();
        assert_eq!(css.content_type(), Some("text/css"));
        assert_eq!(css.body.as_ref(), fallback::STYLESHEET_FALLBACK.as_bytes());

        let js = manager.handle(ResourceRequest::get(url("/pixel.js"))).await.unwrap();
        assert_eq!(js.content_type(), Some("application/javascript"));
        assert_eq!(js.body.as_ref(), fallback::SCRIPT_FALLBACK.as_bytes());

        let static_assets = &manager.config().partitions.static_assets;
        assert_eq!(manager.db().count_entries(static_assets).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_static_not_found_is_not_cached() {
        let network = Arc::new(FakeNetwork::new());
        let manager = activated_manager(network.clone()).await;

        let resp = manager.handle(ResourceRequest::get(url("/gone.js"))).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Fallback);
        let static_assets = &manager.config().partitions.static_assets;
        assert_eq!(manager.db().count_entries(static_assets).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dynamic_success_is_stamped() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/api/price").as_str(), 200, "application/json", r#"{"price":49}"#);
        let manager = activated_manager(network.clone()).await;

        let before = now_millis();
        let resp = manager.handle(ResourceRequest::get(url("/api/price"))).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Network);

        let dynamic = &manager.config().partitions.dynamic;
        let entry = manager.db().get_entry(dynamic, url("/api/price").as_str()).await.unwrap().unwrap();
        assert!(entry.written_at.unwrap() >= before);
        assert!(entry.response.headers.iter().all(|(k, _)| !k.to_ascii_lowercase().contains("time")));
    }

    #[tokio::test]
    async fn test_dynamic_offline_within_window() {
        let network = Arc::new(FakeNetwork::new());
        let manager = activated_manager(network.clone()).await;
        let dynamic = manager.config().partitions.dynamic.clone();
        let key = url("/api/stock").to_string();
        let record = ResponseRecord { status: 200, headers: Vec::new(), body: b"12".to_vec() };
        manager
            .db()
            .put_entry(&dynamic, &key, &record, Some(now_millis() - 299_000))
            .await
            .unwrap();

        network.set_online(false);
        let resp = manager.handle(ResourceRequest::get(url("/api/stock"))).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Cache);
        assert_eq!(resp.body.as_ref(), b"12");
    }

    #[tokio::test]
    async fn test_dynamic_offline_past_window_propagates() {
        let network = Arc::new(FakeNetwork::new());
        let manager = activated_manager(network.clone()).await;
        let dynamic = manager.config().partitions.dynamic.clone();
        let key = url("/api/stock").to_string();
        let record = ResponseRecord { status: 200, headers: Vec::new(), body: b"12".to_vec() };
        manager
            .db()
            .put_entry(&dynamic, &key, &record, Some(now_millis() - 301_000))
            .await
            .unwrap();

        network.set_online(false);
        let err = manager.handle(ResourceRequest::get(url("/api/stock"))).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_dynamic_offline_unstamped_entry_is_served() {
        let network = Arc::new(FakeNetwork::new());
        let manager = activated_manager(network.clone()).await;
        let dynamic = manager.config().partitions.dynamic.clone();
        let record = ResponseRecord { status: 200, headers: Vec::new(), body: b"legacy".to_vec() };
        manager
            .db()
            .put_entry(&dynamic, url("/api/legacy").as_str(), &record, None)
            .await
            .unwrap();

        network.set_online(false);
        let resp = manager.handle(ResourceRequest::get(url("/api/legacy"))).await.unwrap();
        assert_eq!(resp.body.as_ref(), b"legacy");
    }

    #[tokio::test]
    async fn test_dynamic_offline_without_entry_propagates() {
        let network = Arc::new(FakeNetwork::new());
        network.set_online(false);
        let manager = activated_manager(network.clone()).await;

        let err = manager.handle(ResourceRequest::get(url("/api/new"))).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_dynamic_non_ok_returned_and_not_stored() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/api/price").as_str(), 502, "text/plain", "bad gateway");
        let manager = activated_manager(network.clone()).await;

        let resp = manager.handle(ResourceRequest::get(url("/api/price"))).await.unwrap();
        assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
        assert_eq!(resp.source, ResponseSource::Network);
        let dynamic = &manager.config().partitions.dynamic;
        assert_eq!(manager.db().count_entries(dynamic).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_image_inserts_respect_cap() {
        let network = Arc::new(FakeNetwork::new());
        for i in 0..60 {
            network.route(url(&format!("/burst/{i}.webp")).as_str(), 200, "image/webp", "webp");
        }
        let manager = Arc::new(activated_manager(network.clone()).await);

        let tasks: Vec<_> = (0..60)
            .map(|i| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    manager
                        .handle(ResourceRequest::get(url(&format!("/burst/{i}.webp"))))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            let resp = task.await.unwrap();
            assert_eq!(resp.source, ResponseSource::Network);
        }

        let images = &manager.config().partitions.images;
        assert_eq!(manager.db().count_entries(images).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_document_visit_does_not_unstamp_dynamic_entry() {
        let network = Arc::new(FakeNetwork::new());
        network.route(url("/api/page").as_str(), 200, "text/html", "<p>page</p>");
        let manager = activated_manager(network.clone()).await;
        let dynamic = manager.config().partitions.dynamic.clone();
        let key = url("/api/page").to_string();
        let record = ResponseRecord { status: 200, headers: Vec::new(), body: b"old".to_vec() };
        manager
            .db()
            .put_entry(&dynamic, &key, &record, Some(now_millis() - 301_000))
            .await
            .unwrap();

        manager.handle(document("/api/page")).await.unwrap();

        network.set_online(false);
        let err = manager.handle(ResourceRequest::get(url("/api/page"))).await.unwrap_err();
        assert!(err.is_network());
    }
}
