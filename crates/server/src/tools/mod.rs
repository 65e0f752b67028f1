//! MCP tool implementations.
//!
//! This module contains all tools exposed by the lander server.

pub mod cache;
pub mod resource_fetch;

/// Decode the JSON text a tool returned.
#[cfg(test)]
pub(crate) fn output_json<T: serde::de::DeserializeOwned>(result: &rmcp::model::CallToolResult) -> T {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
