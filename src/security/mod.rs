//! Edge security: CORS, identity headers, admin credentials, rate limits.
//!
//! [`edge_headers`] is an axum middleware applied to every route. It
//! assigns the request's correlation id, answers CORS preflights
//! locally, and stamps CORS plus proxy-identity headers on every
//! response. Credential checks live in [`auth`] and admission control in
//! [`rate_limit`]; both are called from the API branch of the proxy.

pub mod auth;
pub mod rate_limit;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const PROXY_IDENTITY_HEADER: &str = "x-proxied-by";
pub const VERSION_HEADER: &str = "x-frontdoor-version";
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

const ALLOW_METHODS: &str = "GET, HEAD, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Admin-Key, If-None-Match, X-Correlation-Id";
const EXPOSE_HEADERS: &str = "ETag, X-Correlation-Id, X-Frontdoor-Version";
const MAX_INBOUND_ID_LEN: usize = 64;

/// Per-request correlation id, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Reuse a well-formed inbound id, otherwise mint a fresh UUID.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let inbound = headers
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| {
                !v.is_empty()
                    && v.len() <= MAX_INBOUND_ID_LEN
                    && v.bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            });
        Self(inbound.map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn edge_headers(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = CorrelationId::from_headers(request.headers());
    let is_preflight = request.method() == Method::OPTIONS;
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = if is_preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    apply_cors(headers);
    apply_identity(headers);
    if let Ok(val) = HeaderValue::from_str(correlation_id.as_str()) {
        headers.insert(CORRELATION_HEADER, val);
    }
    response
}

/// Permissive CORS, identical on every response.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        "access-control-allow-origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        "access-control-expose-headers",
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
    headers.insert("access-control-max-age", HeaderValue::from_static("600"));
}

pub fn apply_identity(headers: &mut HeaderMap) {
    headers.insert(PROXY_IDENTITY_HEADER, HeaderValue::from_static("frontdoor"));
    headers.insert(
        VERSION_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_well_formed_inbound_id() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_HEADER, "req-42_a".parse().unwrap());
        assert_eq!(CorrelationId::from_headers(&headers).as_str(), "req-42_a");
    }

    #[test]
    fn replaces_malformed_inbound_id() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_HEADER, "<script>".parse().unwrap());
        let id = CorrelationId::from_headers(&headers);
        assert_ne!(id.as_str(), "<script>");
        assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn cors_and_identity_headers() {
        let mut headers = HeaderMap::new();
        apply_cors(&mut headers);
        apply_identity(&mut headers);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers[PROXY_IDENTITY_HEADER], "frontdoor");
        assert_eq!(headers[VERSION_HEADER], env!("CARGO_PKG_VERSION"));
    }
}
