//! Network access for the cache manager.
//!
//! ### Network seam
//! - The `Network` trait is the only way the manager reaches the network,
//!   so strategies can be exercised against a fake.
//! - Transport failures (refused, reset, timeout, oversized body) are `Err`.
//!   Every HTTP status, 4xx and 5xx included, is an `Ok` response.
//!
//! ### Upstream routing
//! - Requests for the page origin are rewritten onto the configured upstream
//!   (scheme, host and port), keeping path and query.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod request;
pub mod response;
pub mod url;

use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use request::ResourceRequest;
pub use response::{ResourceResponse, ResponseSource};
pub use self::url::{UrlError, cache_key, canonicalize, is_same_origin};

use lander_core::Error;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Source of network responses for the cache manager.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Perform the request against the network.
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "lander/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Page origin whose requests are rerouted (default: none)
    pub origin: Option<::url::Url>,

    /// Where page-origin requests are sent (default: none)
    pub upstream: Option<::url::Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "lander/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
            upstream: None,
        }
    }
}

impl FetchConfig {
    /// Build from the application configuration.
    pub fn from_app_config(config: &lander_core::AppConfig) -> Result<Self, Error> {
        let origin = ::url::Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let upstream = ::url::Url::parse(&config.upstream_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            origin: Some(origin),
            upstream: Some(upstream),
            ..Default::default()
        })
    }
}

/// HTTP client that talks to the upstream site.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// The URL a request is actually sent to.
    pub fn route(&self, url: &::url::Url) -> ::url::Url {
        match (&self.config.origin, &self.config.upstream) {
            (Some(origin), Some(upstream)) if is_same_origin(url, origin) => {
                let mut target = upstream.clone();
                target.set_path(url.path());
                target.set_query(url.query());
                target
            }
            _ => url.clone(),
        }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, Error> {
        let start = Instant::now();
        let target = self.route(&request.url);

        let mut builder = self.http.request(request.method.clone(), target.as_str());
        for (name, value) in &request.headers {
            if *name != header::HOST && !is_hop_by_hop(name) {
                builder = builder.header(name, value);
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", target, e))
            } else {
                Error::Network(format!("{}: {}", target, e))
            }
        })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let mut headers = response.headers().clone();
        for name in HOP_BY_HOP {
            headers.remove(*name);
        }

        let bytes: Bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", target, e))
            } else {
                Error::Network(format!("failed to read response: {}", e))
            }
        })?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(ResourceResponse { status, headers, body: bytes, source: ResponseSource::Network })
    }
}
