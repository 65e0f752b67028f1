//! Response representation shared by the network, the cache and fallbacks.

use bytes::Bytes;
use lander_core::{Error, ResponseRecord};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Cache => "cache",
            Self::Fallback => "fallback",
        }
    }
}

/// A response returned to the page.
#[derive(Debug, Clone)]
pub struct ResourceResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl ResourceResponse {
    /// A generated response with a fixed content type.
    pub fn synthetic(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self { status, headers, body: body.into(), source: ResponseSource::Fallback }
    }

    /// Whether the status is 2xx.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Storable copy of this response. Header values that are not UTF-8 are skipped.
    pub fn to_record(&self) -> ResponseRecord {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();

        ResponseRecord { status: self.status.as_u16(), headers, body: self.body.to_vec() }
    }

    /// Rebuild a response from a stored record.
    pub fn from_record(record: ResponseRecord, source: ResponseSource) -> Result<Self, Error> {
        let status = StatusCode::from_u16(record.status)
            .map_err(|e| Error::CorruptEntry(format!("status {}: {e}", record.status)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &record.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!("skipping unparsable stored header {}", name),
            }
        }

        Ok(Self { status, headers, body: Bytes::from(record.body), source })
    }
}
