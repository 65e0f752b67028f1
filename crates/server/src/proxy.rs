//! HTTP interception proxy.
//!
//! Every inbound request is rebuilt on the page origin and answered by the
//! cache manager. The `x-lander-source` header says where the body came from.
//!
//! Only the path and query of the request target are used, so a request can
//! never name another host. Conditional headers are dropped from GETs: the
//! manager stores and serves full responses and has no use for a 304.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use lander_client::{CacheManager, ResourceRequest, ResourceResponse};
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub const SOURCE_HEADER: &str = "x-lander-source";

const CONDITIONAL_HEADERS: [header::HeaderName; 5] = [
    header::IF_NONE_MATCH,
    header::IF_MODIFIED_SINCE,
    header::IF_MATCH,
    header::IF_UNMODIFIED_SINCE,
    header::IF_RANGE,
];

#[derive(Clone)]
pub struct ProxyState {
    pub manager: Arc<CacheManager>,
    /// Largest request body accepted from the page.
    pub max_body_bytes: usize,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    state: &'static str,
    controlling: bool,
    partitions: Vec<String>,
    version: &'static str,
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/_lander/health", get(health))
        .fallback(intercept)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<ProxyState>) -> Json<Health> {
    let worker = state.manager.state().await;
    let partitions = state.manager.config().partitions.all().iter().map(|s| s.to_string()).collect();

    Json(Health {
        status: "healthy",
        state: worker.as_str(),
        controlling: state.manager.is_controlling().await,
        partitions,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn intercept(State(state): State<ProxyState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!("rejecting request body: {}", e);
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };

    let mut url = state.manager.config().origin.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let mut headers = parts.headers;
    if parts.method == Method::GET {
        strip_conditional(&mut headers);
    }

    let mut resource = ResourceRequest::new(parts.method, url).with_body(body);
    resource.headers = headers;

    match state.manager.handle(resource).await {
        Ok(resp) => into_http(resp),
        Err(e) => {
            tracing::debug!("request failed: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

fn strip_conditional(headers: &mut HeaderMap) {
    for name in &CONDITIONAL_HEADERS {
        headers.remove(name);
    }
}

fn into_http(resp: ResourceResponse) -> Response {
    let source = resp.source;
    let mut response = Response::new(Body::from(resp.body));
    *response.status_mut() = resp.status;
    *response.headers_mut() = resp.headers;
    response
        .headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(source.as_str()));
    response
}
