//! Upstream header construction and client address extraction.
//!
//! [`build_upstream_headers`] starts from an empty map and copies only an
//! allow-list of client headers, then adds proxy metadata
//! (`X-Forwarded-For`, `X-Correlation-Id`, `Via`) and rewrites `Host`.
//! Cookies, credentials and conditional headers never reach the backend.

use std::net::{IpAddr, SocketAddr};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::security::CORRELATION_HEADER;

const FORWARDED_ALLOW_LIST: [HeaderName; 4] = [
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::CONTENT_TYPE,
    header::USER_AGENT,
];

pub fn build_upstream_headers(
    original: &HeaderMap,
    client_ip: IpAddr,
    target_url: &url::Url,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in &FORWARDED_ALLOW_LIST {
        if let Some(value) = original.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    set_host(&mut headers, target_url);

    // X-Forwarded-For: append to chain
    let client_ip = client_ip.to_string();
    let xff = original
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.clone(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    headers.insert(header::VIA, HeaderValue::from_static("1.1 frontdoor"));

    if let Ok(val) = HeaderValue::from_str(correlation_id) {
        headers.insert(CORRELATION_HEADER, val);
    }

    headers
}

/// Point `Host` at `target_url`. Called again on every redirect hop.
pub fn set_host(headers: &mut HeaderMap, target_url: &url::Url) {
    if let Some(host) = target_url.host_str() {
        let host_value = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        if let Ok(val) = HeaderValue::from_str(&host_value) {
            headers.insert(header::HOST, val);
        }
    }
}

/// The originating client.
///
/// `X-Forwarded-For` is only believed when the socket peer is one of
/// `trusted`. The chain is then walked right to left and the first hop
/// that is not itself a trusted proxy wins. A malformed hop stops the
/// walk at the last address that could be verified.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trusted: &[IpAddr]) -> IpAddr {
    let mut client = peer.ip();
    if !trusted.contains(&client) {
        return client;
    }

    let Some(chain) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    else {
        return client;
    };

    for hop in chain.rsplit(',') {
        match hop.trim().parse::<IpAddr>() {
            Ok(ip) => {
                client = ip;
                if !trusted.contains(&ip) {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    client
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> url::Url {
        url::Url::parse("http://backend:9090/exec").unwrap()
    }

    #[test]
    fn copies_only_allow_listed_headers() {
        let mut original = HeaderMap::new();
        original.insert("cookie", "session=1".parse().unwrap());
        original.insert("authorization", "Bearer x".parse().unwrap());
        original.insert("if-none-match", "\"abc\"".parse().unwrap());
        original.insert("content-type", "application/json".parse().unwrap());
        original.insert("accept-language", "fr".parse().unwrap());

        let result = build_upstream_headers(&original, "10.0.0.1".parse().unwrap(), &target(), "cid");

        assert!(result.get("cookie").is_none());
        assert!(result.get("authorization").is_none());
        assert!(result.get("if-none-match").is_none());
        assert_eq!(result.get("content-type").unwrap(), "application/json");
        assert_eq!(result.get("accept-language").unwrap(), "fr");
    }

    #[test]
    fn rewrites_host() {
        let result = build_upstream_headers(&HeaderMap::new(), "10.0.0.1".parse().unwrap(), &target(), "cid");
        assert_eq!(result.get("host").unwrap(), "backend:9090");
    }

    #[test]
    fn appends_x_forwarded_for() {
        let mut original = HeaderMap::new();
        original.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        let result = build_upstream_headers(&original, "10.0.0.1".parse().unwrap(), &target(), "cid");
        assert_eq!(result.get("x-forwarded-for").unwrap(), "1.2.3.4, 10.0.0.1");
    }

    #[test]
    fn sets_correlation_id() {
        let result = build_upstream_headers(
            &HeaderMap::new(),
            "10.0.0.1".parse().unwrap(),
            &target(),
            "my-correlation-id",
        );
        assert_eq!(result.get("x-correlation-id").unwrap(), "my-correlation-id");
    }

    #[test]
    fn forwarded_for_ignored_from_untrusted_peer() {
        let peer: SocketAddr = "198.51.100.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer, &[]), peer.ip());
        for i in 0..20u8 {
            let forged = format!("203.0.113.{i}");
            headers.insert("x-forwarded-for", forged.parse().unwrap());
            assert_eq!(client_ip(&headers, peer, &[]), peer.ip());
        }
    }

    #[test]
    fn trusted_peer_yields_rightmost_untrusted_hop() {
        let proxy: IpAddr = "10.0.0.2".parse().unwrap();
        let inner: IpAddr = "10.0.0.3".parse().unwrap();
        let peer = SocketAddr::new(proxy, 5000);
        let trusted = [proxy, inner];

        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer, &trusted), proxy);

        // The left-most entry is whatever the client sent; only the hop
        // appended by our own proxies counts.
        headers.insert(
            "x-forwarded-for",
            "1.1.1.1, 203.0.113.7, 10.0.0.3".parse().unwrap(),
        );
        assert_eq!(
            client_ip(&headers, peer, &trusted),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );

        headers.insert("x-forwarded-for", "garbage, 10.0.0.3".parse().unwrap());
        assert_eq!(client_ip(&headers, peer, &trusted), inner);
    }
}
