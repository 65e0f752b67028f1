//! resource_fetch tool implementation.
//!
//! Routes one request through the cache manager, exactly as the proxy would.

use axum::http::{Method, header::ACCEPT};
use lander_client::fetch::{canonicalize, is_same_origin};
use lander_client::{CacheManager, ResourceRequest};
use lander_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the resource_fetch tool.
///
/// Only URLs on the page origin are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceFetchParams {
    /// Absolute URL, or a path resolved against the page origin.
    pub url: String,

    /// Optional Accept header, which steers classification.
    #[serde(default)]
    pub accept: Option<String>,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output structure for the resource_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceFetchOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// "network", "cache" or "fallback".
    pub source: String,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
}

pub async fn fetch_impl(manager: &CacheManager, params: ResourceFetchParams) -> Result<CallToolResult, McpError> {
    let origin = &manager.config().origin;
    let url = canonicalize(&params.url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    if !is_same_origin(&url, origin) {
        return Err(Error::InvalidInput(format!("{url} is not on {origin}")).into());
    }

    let method = match params.method.as_deref() {
        None => Method::GET,
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("unsupported method: {m}")))?,
    };

    let mut request = ResourceRequest::new(method, url);
    if let Some(accept) = params.accept.as_deref() {
        request = request.with_header(ACCEPT, accept);
    }

    tracing::debug!("resource_fetch {} {}", request.method, request.url);
    let url = request.url.to_string();
    let response = manager.handle(request).await?;

    let output = ResourceFetchOutput {
        url,
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        source: response.source.as_str().to_string(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
