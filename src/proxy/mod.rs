//! The gateway request handler.
//!
//! [`gateway_handler`] is the Axum fallback that receives every request
//! except the local health endpoint. It classifies the request, then
//! either renders an HTML page locally or proxies a JSON, API, or
//! shortlink call to the backend. Submodules cover the API whitelist
//! ([`action`]), the upstream client ([`client`]), upstream response
//! classification ([`classify`]), and header construction ([`headers`]).

pub mod action;
pub mod classify;
pub mod client;
pub mod headers;

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, Extension, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use url::Url;

use self::action::RpcRequest;
use self::client::{UpstreamFailure, UpstreamRequest, UpstreamResponse};
use crate::brand::Brand;
use crate::cache::{self, CacheOutcome, SuccessEnvelope};
use crate::error::{ErrorCode, GatewayError};
use crate::routing::{self, LogicalPage, Query, RequestTarget, RouteKind, Target};
use crate::security::auth::{self, Decision};
use crate::security::{CorrelationId, ADMIN_KEY_HEADER};
use crate::server::AppState;
use crate::templates::{self, RenderContext};

/// Query keys the gateway consumes itself; never forwarded verbatim.
const RESERVED_QUERY_KEYS: &[&str] = &[
    "p", "page", "brand", "tenant", "t", "token", "action", "adminkey", "admin_key",
];

const DEFAULT_SCOPE: &str = "events";
const MAX_SHORTLINK_TOKEN: usize = 128;

/// Everything a branch needs to know about the request being served.
struct RequestContext<'a> {
    state: &'a AppState,
    correlation_id: &'a str,
    brand: &'a Brand,
    method: &'a Method,
    headers: &'a HeaderMap,
    query: &'a Query,
    peer: SocketAddr,
}

impl RequestContext<'_> {
    fn client_ip(&self) -> IpAddr {
        headers::client_ip(self.headers, self.peer, &self.state.trusted_proxies)
    }

    fn if_none_match(&self) -> Option<&str> {
        self.headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
    }
}

pub async fn gateway_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(correlation_id): Extension<CorrelationId>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %correlation_id.as_str(),
                method = %method,
                path = %uri.path(),
                status = rejection.status().as_u16(),
                error = %rejection.body_text(),
                "request body rejected"
            );
            return error_response(
                GatewayError::new(ErrorCode::BadInput, "request body is too large or unreadable"),
                correlation_id.as_str(),
            );
        }
    };

    let path = uri.path();
    let query = Query::parse(uri.query());
    let host = req_headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok());

    let classification = routing::classify(
        &state.routes,
        &state.brands,
        &RequestTarget {
            path,
            method: &method,
            query: &query,
            host,
        },
    );

    let ctx = RequestContext {
        state: &state,
        correlation_id: correlation_id.as_str(),
        brand: classification.brand,
        method: &method,
        headers: &req_headers,
        query: &query,
        peer,
    };

    tracing::debug!(
        correlation_id = %ctx.correlation_id,
        method = %method,
        path = %path,
        brand = %ctx.brand.id,
        brand_source = classification.brand_source.as_str(),
        page = ?classification.logical_page(),
        "request classified"
    );

    match &classification.target {
        Target::Unroutable => not_found(&ctx, path),
        Target::Matched { page, kind, .. } => match kind {
            RouteKind::Html => render_page(&ctx, *page),
            RouteKind::Json => proxy_json(&ctx, *page).await,
            RouteKind::Api => proxy_api(&ctx, classification.argument(), &body).await,
            RouteKind::Shortlink => proxy_shortlink(&ctx, classification.argument()).await,
        },
    }
}

fn not_found(ctx: &RequestContext<'_>, path: &str) -> Response {
    ctx.state.stats.rejected.fetch_add(1, Ordering::Relaxed);
    tracing::info!(
        correlation_id = %ctx.correlation_id,
        method = %ctx.method,
        path = %path,
        "no route matched"
    );
    let err = GatewayError::new(ErrorCode::NotFound, "no such page");
    if wants_json(path, ctx.headers) {
        error_response(err, ctx.correlation_id)
    } else {
        html_error(err, ctx.correlation_id)
    }
}

fn render_page(ctx: &RequestContext<'_>, page: LogicalPage) -> Response {
    let state = ctx.state;
    let demo_mode = state.demo_mode
        || ctx
            .query
            .get("demo")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let render_ctx = RenderContext {
        brand_id: &ctx.brand.id,
        brand_display_name: &ctx.brand.display_name,
        scope: ctx.query.get("scope").unwrap_or(DEFAULT_SCOPE),
        upstream_base_url: state.upstream_base.as_str(),
        demo_mode,
    };

    match templates::render(&state.templates, page, &render_ctx) {
        Ok(html) => {
            state.stats.rendered.fetch_add(1, Ordering::Relaxed);
            let mut response = Html(html).into_response();
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response
        }
        Err(missing) => {
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                correlation_id = %ctx.correlation_id,
                brand = %ctx.brand.id,
                page = %missing.page,
                "template bundle is missing a page"
            );
            html_error(
                GatewayError::new(ErrorCode::TemplateMissing, "this page is temporarily unavailable"),
                ctx.correlation_id,
            )
        }
    }
}

async fn proxy_json(ctx: &RequestContext<'_>, page: LogicalPage) -> Response {
    let mut params = ctx.query.normalized(RESERVED_QUERY_KEYS);
    params.insert("p".into(), page.as_str().into());
    params.insert("brand".into(), ctx.brand.id.clone());

    let url = upstream_url(&ctx.state.upstream_base, &params);
    let request = upstream_request(ctx, Method::GET, url, Bytes::new());
    let timeout = Duration::from_millis(ctx.state.timeouts.for_kind(RouteKind::Json));

    match call_upstream(ctx, RouteKind::Json, request, timeout).await {
        Ok(value) => cached_response(value, ctx.if_none_match()),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

async fn proxy_api(ctx: &RequestContext<'_>, path_action: Option<&str>, body: &Bytes) -> Response {
    let state = ctx.state;

    let client = ctx.client_ip();
    if let Err(retry_after) = state.rate_limiter.check(&ctx.brand.id, client) {
        state.stats.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            correlation_id = %ctx.correlation_id,
            brand = %ctx.brand.id,
            client = %client,
            retry_after_secs = retry_after.as_secs(),
            "rate limit exceeded"
        );
        let mut response = error_response(
            GatewayError::new(ErrorCode::RateLimited, "too many requests, try again later"),
            ctx.correlation_id,
        );
        if let Ok(val) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, val);
        }
        return response;
    }

    let call = match action::parse_call(ctx.method, path_action, body, ctx.query) {
        Ok(call) => call,
        Err(err) => {
            state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %ctx.correlation_id,
                error_code = %err.code,
                detail = %err.message,
                "API call rejected"
            );
            return error_response(err, ctx.correlation_id);
        }
    };

    let credential = ctx
        .headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(call.admin_key.as_deref());

    if let Decision::Deny(reason) = auth::authorize(ctx.brand, call.action, credential) {
        state.stats.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            correlation_id = %ctx.correlation_id,
            brand = %ctx.brand.id,
            action = %call.action,
            reason = reason.message(),
            "admin credential rejected"
        );
        return error_response(
            GatewayError::new(ErrorCode::Unauthorized, reason.message()),
            ctx.correlation_id,
        );
    }

    let rpc = RpcRequest {
        action: call.action.name(),
        brand_id: &ctx.brand.id,
        admin_key: credential.filter(|_| call.action.is_mutating()),
        payload: &call.payload,
    };
    let rpc_body = match serde_json::to_vec(&rpc) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            return error_response(
                GatewayError::new(ErrorCode::BadInput, format!("payload cannot be encoded: {e}")),
                ctx.correlation_id,
            )
        }
    };

    let mut request = upstream_request(ctx, Method::POST, ctx.state.upstream_base.clone(), rpc_body);
    request.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    let timeout = Duration::from_millis(state.timeouts.for_kind(RouteKind::Api));

    match call_upstream(ctx, RouteKind::Api, request, timeout).await {
        Ok(value) => {
            let conditional = if call.action.is_mutating() {
                None
            } else {
                ctx.if_none_match()
            };
            cached_response(value, conditional)
        }
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

async fn proxy_shortlink(ctx: &RequestContext<'_>, token: Option<&str>) -> Response {
    let token = match token.map(str::trim) {
        Some(t) if is_valid_token(t) => t,
        _ => {
            ctx.state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return error_response(
                GatewayError::new(ErrorCode::BadInput, "missing or malformed shortlink token"),
                ctx.correlation_id,
            );
        }
    };

    let mut params = BTreeMap::new();
    params.insert("p".to_string(), "r".to_string());
    params.insert("t".to_string(), token.to_string());
    params.insert("brand".to_string(), ctx.brand.id.clone());

    let url = upstream_url(&ctx.state.upstream_base, &params);
    let request = upstream_request(ctx, Method::GET, url, Bytes::new());
    let timeout = Duration::from_millis(ctx.state.timeouts.for_kind(RouteKind::Shortlink));

    let value = match call_upstream(ctx, RouteKind::Shortlink, request, timeout).await {
        Ok(value) => value,
        Err(err) => return error_response(err, ctx.correlation_id),
    };

    match redirect_target(&value) {
        Some(location) => match HeaderValue::from_str(location.as_str()) {
            Ok(val) => (StatusCode::FOUND, [(header::LOCATION, val)]).into_response(),
            Err(_) => contract_violation(ctx, "shortlink target is not a valid header value"),
        },
        None => contract_violation(ctx, "shortlink did not resolve to an http(s) URL"),
    }
}

fn contract_violation(ctx: &RequestContext<'_>, message: &str) -> Response {
    ctx.state.stats.failed.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(correlation_id = %ctx.correlation_id, detail = message, "backend contract violation");
    error_response(GatewayError::new(ErrorCode::Contract, message), ctx.correlation_id)
}

/// Forward, classify, count, and log one upstream exchange.
async fn call_upstream(
    ctx: &RequestContext<'_>,
    kind: RouteKind,
    request: UpstreamRequest,
    timeout: Duration,
) -> Result<Value, GatewayError> {
    let outcome = ctx.state.upstream.forward(request, timeout).await;
    let classified = classify::classify(&outcome);

    match (&classified, &outcome) {
        (Ok(_), Ok(response)) => {
            ctx.state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            log_response(ctx, kind, response);
        }
        (Err(err), Ok(response)) => {
            ctx.state.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                correlation_id = %ctx.correlation_id,
                brand = %ctx.brand.id,
                kind = kind.as_str(),
                status = response.status.as_u16(),
                content_type = response.content_type.as_deref().unwrap_or("-"),
                error_code = %err.code,
                snippet = %classify::snippet(&response.body),
                "upstream response rejected"
            );
        }
        (_, Err(failure)) => {
            ctx.state.stats.failed.fetch_add(1, Ordering::Relaxed);
            log_failure(ctx, kind, failure);
        }
    }

    classified
}

fn log_response(ctx: &RequestContext<'_>, kind: RouteKind, response: &UpstreamResponse) {
    tracing::info!(
        correlation_id = %ctx.correlation_id,
        brand = %ctx.brand.id,
        kind = kind.as_str(),
        status = response.status.as_u16(),
        redirects = response.redirects,
        latency_ms = u64::try_from(response.latency.as_millis()).unwrap_or(u64::MAX),
        "upstream responded"
    );
}

fn log_failure(ctx: &RequestContext<'_>, kind: RouteKind, failure: &UpstreamFailure) {
    tracing::warn!(
        correlation_id = %ctx.correlation_id,
        brand = %ctx.brand.id,
        kind = kind.as_str(),
        error = %failure,
        "upstream call failed"
    );
}

fn upstream_request(ctx: &RequestContext<'_>, method: Method, url: Url, body: Bytes) -> UpstreamRequest {
    let headers = headers::build_upstream_headers(ctx.headers, ctx.peer.ip(), &url, ctx.correlation_id);
    UpstreamRequest {
        method,
        url,
        headers,
        body,
    }
}

/// Base URL plus sorted parameters. Pairs already on the base are kept.
fn upstream_url(base: &Url, params: &BTreeMap<String, String>) -> Url {
    let mut url = base.clone();
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in params {
            pairs.append_pair(k, v);
        }
    }
    url
}

fn redirect_target(value: &Value) -> Option<Url> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("url").and_then(Value::as_str)?,
        _ => return None,
    };
    Url::parse(raw)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_SHORTLINK_TOKEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn cached_response(value: Value, if_none_match: Option<&str>) -> Response {
    let outcome = cache::with_cache(value, if_none_match);
    let etag = HeaderValue::from_str(outcome.etag()).ok();

    let mut response = match &outcome {
        CacheOutcome::NotModified { .. } => StatusCode::NOT_MODIFIED.into_response(),
        CacheOutcome::Fresh { etag, body } => {
            let envelope = SuccessEnvelope {
                ok: true,
                value: body,
                etag,
            };
            let mut response = Json(&envelope).into_response();
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response
        }
    };
    if let Some(val) = etag {
        response.headers_mut().insert(header::ETAG, val);
    }
    response
}

/// JSON error envelope with the matching status code.
pub fn error_response(err: GatewayError, correlation_id: &str) -> Response {
    let status = err.code.status();
    (status, Json(err.into_envelope(correlation_id))).into_response()
}

/// Locally rendered HTML error page with the matching status code.
pub fn html_error(err: GatewayError, correlation_id: &str) -> Response {
    let status = err.code.status();
    let page = templates::error_page(err.code, &err.message, correlation_id);
    let mut response = (status, Html(page)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn wants_json(path: &str, headers: &HeaderMap) -> bool {
    let api_path = path
        .trim_start_matches('/')
        .split('/')
        .any(|s| s.eq_ignore_ascii_case(routing::API_PREFIX));
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|a| a.contains("application/json") && !a.contains("text/html"));
    api_path || accepts_json
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upstream_url_keeps_base_query_and_sorts() {
        let base = Url::parse("https://backend.example/exec?key=1").unwrap();
        let mut params = BTreeMap::new();
        params.insert("p".to_string(), "status".to_string());
        params.insert("brand".to_string(), "abc".to_string());
        let url = upstream_url(&base, &params);
        assert_eq!(url.as_str(), "https://backend.example/exec?key=1&brand=abc&p=status");
    }

    #[test]
    fn redirect_target_accepts_string_or_object() {
        assert!(redirect_target(&json!("https://example.org/x")).is_some());
        assert!(redirect_target(&json!({"url": "http://example.org"})).is_some());
        assert!(redirect_target(&json!({"url": "javascript:alert(1)"})).is_none());
        assert!(redirect_target(&json!(42)).is_none());
    }

    #[test]
    fn token_validation() {
        assert!(is_valid_token("abc_123-XY"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("../etc"));
        assert!(!is_valid_token(&"a".repeat(MAX_SHORTLINK_TOKEN + 1)));
    }

    #[test]
    fn wants_json_for_api_paths_and_json_accept() {
        let mut headers = HeaderMap::new();
        assert!(wants_json("/abc/api/x", &headers));
        assert!(!wants_json("/nope", &headers));
        headers.insert(header::ACCEPT, "application/json".parse().unwrap());
        assert!(wants_json("/nope", &headers));
    }
}
