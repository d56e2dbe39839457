//! Upstream proxy client.
//!
//! [`UpstreamClient::forward`] sends one request to the backend with a
//! hard deadline covering the whole exchange: every redirect hop and the
//! body read. Hosted-script backends answer with a redirect to a content
//! host, so 3xx responses are followed up to a fixed budget; 301/302/303
//! turn the request into a bodyless GET. A 307/308 keeps the method and
//! body only while it stays on the origin of the first request; a hop to
//! any other origin is downgraded to a bodyless GET, so RPC bodies
//! carrying admin keys never leave the backend. There is no retry.
//!
//! Dropping the returned future (client disconnect, timeout) drops the
//! in-flight hyper request, which aborts it.

use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, Method, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use url::Url;

use super::headers::set_host;
use crate::server::HttpClient;

/// Upper bound on a buffered upstream body.
pub const MAX_UPSTREAM_BODY: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub redirects: u8,
    pub latency: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamFailure {
    #[error("upstream did not answer within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("upstream redirected more than {0} times")]
    RedirectLoop(u8),

    #[error("upstream transport error: {0}")]
    Transport(String),
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: HttpClient,
    max_redirects: u8,
}

impl UpstreamClient {
    #[must_use]
    pub const fn new(http: HttpClient, max_redirects: u8) -> Self {
        Self {
            http,
            max_redirects,
        }
    }

    pub async fn forward(
        &self,
        request: UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, UpstreamFailure> {
        let start = Instant::now();
        let mut response = tokio::time::timeout(timeout, self.follow(request))
            .await
            .map_err(|_| UpstreamFailure::Timeout(timeout))??;
        response.latency = start.elapsed();
        Ok(response)
    }

    async fn follow(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamFailure> {
        let UpstreamRequest {
            mut method,
            mut url,
            mut headers,
            mut body,
        } = request;
        let origin = url.origin();

        for hop in 0..=self.max_redirects {
            let mut builder = hyper::Request::builder()
                .method(method.clone())
                .uri(url.as_str());
            for (key, value) in &headers {
                builder = builder.header(key, value);
            }
            let req = builder
                .body(Full::new(body.clone()))
                .map_err(|e| UpstreamFailure::Transport(e.to_string()))?;

            let response = self
                .http
                .request(req)
                .await
                .map_err(|e| UpstreamFailure::Transport(e.to_string()))?;

            let status = response.status();
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| url.join(loc).ok());

            if is_followable(status) {
                if let Some(next) = location {
                    tracing::debug!(hop, status = status.as_u16(), next = %redact_query(&next), "following upstream redirect");
                    if !keeps_body(status, &method, next.origin() == origin) {
                        method = Method::GET;
                        body = Bytes::new();
                        headers.remove(header::CONTENT_TYPE);
                    }
                    set_host(&mut headers, &next);
                    url = next;
                    continue;
                }
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_ascii_lowercase);

            let collected = Limited::new(response.into_body(), MAX_UPSTREAM_BODY)
                .collect()
                .await
                .map_err(|e| UpstreamFailure::Transport(format!("body read error: {e}")))?;

            return Ok(UpstreamResponse {
                status,
                content_type,
                body: collected.to_bytes(),
                redirects: hop,
                latency: Duration::ZERO,
            });
        }

        Err(UpstreamFailure::RedirectLoop(self.max_redirects))
    }
}

const fn is_followable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Whether a redirect hop may replay the method and body as-is.
fn keeps_body(status: StatusCode, method: &Method, same_origin: bool) -> bool {
    if *method == Method::GET || *method == Method::HEAD {
        return true;
    }
    matches!(
        status,
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
    ) && same_origin
}

/// Hosted-script redirect targets carry one-time tokens in the query.
fn redact_query(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.query().is_some() {
        shown.set_query(Some("…"));
    }
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_redirect_statuses_are_followed() {
        assert!(is_followable(StatusCode::FOUND));
        assert!(is_followable(StatusCode::PERMANENT_REDIRECT));
        assert!(!is_followable(StatusCode::NOT_MODIFIED));
        assert!(!is_followable(StatusCode::OK));
    }

    #[test]
    fn body_survives_only_same_origin_307_308() {
        assert!(keeps_body(StatusCode::TEMPORARY_REDIRECT, &Method::POST, true));
        assert!(keeps_body(StatusCode::PERMANENT_REDIRECT, &Method::POST, true));
        assert!(!keeps_body(StatusCode::TEMPORARY_REDIRECT, &Method::POST, false));
        assert!(!keeps_body(StatusCode::FOUND, &Method::POST, true));
        assert!(keeps_body(StatusCode::FOUND, &Method::HEAD, false));
        assert!(keeps_body(StatusCode::SEE_OTHER, &Method::GET, false));
    }

    #[test]
    fn redacts_redirect_query() {
        let url = Url::parse("https://content.example/echo?user_content_key=secret").unwrap();
        assert!(!redact_query(&url).contains("secret"));
    }
}
