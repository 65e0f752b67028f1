//! cache_get tool implementation.
//!
//! Retrieves one stored response by partition and URL.

use lander_client::fetch::{cache_key, canonicalize};
use lander_core::{CacheDb, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Partition name, e.g. "lander-v1.0.0-static".
    pub partition: String,

    /// URL of the stored request; paths resolve against the page origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub partition: String,
    pub key: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub stored_at: String,
    /// Unix milliseconds, present only on entries with a freshness window.
    pub written_at: Option<i64>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
}

pub async fn get_impl(cache: &CacheDb, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = cache_key(&url);

    let entry = cache
        .get_entry(&params.partition, &key)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} in {}", key, params.partition)))?;

    let output = CacheGetOutput {
        partition: entry.partition,
        key: entry.key,
        status: entry.response.status,
        headers: entry.response.headers,
        stored_at: entry.stored_at,
        written_at: entry.written_at,
        body: String::from_utf8_lossy(&entry.response.body).into_owned(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
