//! Request classification.
//!
//! Checks run in a fixed order (image, document, static asset) and anything
//! left over is dynamic content, so every request lands in exactly one class.

use std::sync::LazyLock;

use regex::Regex;

use crate::fetch::ResourceRequest;

static IMAGE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(?:jpe?g|png|gif|webp|svg|ico|avif|bmp)$").expect("valid image pattern"));

static ASSET_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(css|m?js|woff2?|ttf|otf|eot)$").expect("valid asset pattern"));

/// Kind of static asset, which decides the inert fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Stylesheet,
    Script,
    Font,
}

/// The caching strategy a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Image,
    Document,
    StaticAsset(AssetKind),
    Dynamic,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::StaticAsset(_) => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

fn asset_kind_for_extension(ext: &str) -> AssetKind {
    match ext.to_ascii_lowercase().as_str() {
        "css" => AssetKind::Stylesheet,
        "js" | "mjs" => AssetKind::Script,
        _ => AssetKind::Font,
    }
}

fn is_image(request: &ResourceRequest, dest: Option<&str>) -> bool {
    dest == Some("image")
        || request.accept().is_some_and(|a| a.trim_start().starts_with("image/"))
        || IMAGE_PATH.is_match(request.url.path())
}

fn is_document(request: &ResourceRequest, dest: Option<&str>) -> bool {
    dest == Some("document") || request.accept().is_some_and(|a| a.contains("text/html"))
}

fn asset_kind(request: &ResourceRequest, dest: Option<&str>) -> Option<AssetKind> {
    match dest {
        Some("style") => return Some(AssetKind::Stylesheet),
        Some("script") => return Some(AssetKind::Script),
        Some("font") => return Some(AssetKind::Font),
        _ => {}
    }

    ASSET_PATH
        .captures(request.url.path())
        .and_then(|c| c.get(1))
        .map(|m| asset_kind_for_extension(m.as_str()))
}

/// Pick the strategy for a request.
pub fn classify(request: &ResourceRequest) -> ResourceClass {
    let dest = request.header("sec-fetch-dest");

    if is_image(request, dest) {
        ResourceClass::Image
    } else if is_document(request, dest) {
        ResourceClass::Document
    } else if let Some(kind) = asset_kind(request, dest) {
        ResourceClass::StaticAsset(kind)
    } else {
        ResourceClass::Dynamic
    }
}
