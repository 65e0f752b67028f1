//! Locally generated responses for requests neither the network nor the
//! cache could satisfy. None of these are ever written to a partition.

use reqwest::StatusCode;

use super::classify::AssetKind;
use crate::fetch::ResourceResponse;

pub const IMAGE_PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300">
  <rect width="400" height="300" fill="#f0f0f0"/>
  <text x="200" y="150" font-family="Arial, sans-serif" font-size="16" fill="#999" text-anchor="middle" dominant-baseline="middle">Image temporarily unavailable</text>
</svg>"##;

pub const OFFLINE_PAGE_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Offline</title>
  <style>
    body { font-family: Arial, sans-serif; text-align: center; padding: 60px 20px; color: #333; }
    button { margin-top: 20px; padding: 12px 28px; font-size: 16px; border: 0; border-radius: 6px; background: #222; color: #fff; cursor: pointer; }
  </style>
</head>
<body>
  <h1>You're offline</h1>
  <p>Please check your internet connection and try again.</p>
  <button onclick="location.reload()">Retry</button>
</body>
</html>"##;

pub const STYLESHEET_FALLBACK: &str = "/* stylesheet unavailable offline */";

pub const SCRIPT_FALLBACK: &str = "// script unavailable offline";

/// Gray SVG placeholder for an image that could not be loaded.
pub fn image_placeholder() -> ResourceResponse {
    ResourceResponse::synthetic(StatusCode::OK, "image/svg+xml", IMAGE_PLACEHOLDER_SVG)
}

/// Offline page with a retry button.
pub fn offline_page() -> ResourceResponse {
    ResourceResponse::synthetic(StatusCode::OK, "text/html; charset=utf-8", OFFLINE_PAGE_HTML)
}

/// Inert stand-in for a static asset so page execution carries on.
pub fn static_asset(kind: AssetKind) -> ResourceResponse {
    match kind {
        AssetKind::Stylesheet => ResourceResponse::synthetic(StatusCode::OK, "text/css", STYLESHEET_FALLBACK),
        AssetKind::Script => ResourceResponse::synthetic(StatusCode::OK, "application/javascript", SCRIPT_FALLBACK),
        // no meaningful empty font exists; the browser falls back to the next face
        AssetKind::Font => ResourceResponse::synthetic(StatusCode::SERVICE_UNAVAILABLE, "font/woff2", ""),
    }
}
