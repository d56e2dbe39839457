//! Conditional-request handling for proxied JSON values.
//!
//! Nothing is stored: the ETag is a SHA-256 over the serialized value,
//! recomputed per request, so identical values always get identical tags.

use serde::Serialize;
use serde_json::Value;

use crate::config::sources::sha256_hex;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    Fresh { etag: String, body: Value },
    NotModified { etag: String },
}

impl CacheOutcome {
    #[must_use]
    pub fn etag(&self) -> &str {
        match self {
            Self::Fresh { etag, .. } | Self::NotModified { etag } => etag,
        }
    }
}

/// The success body sent to clients: `{ok:true, value, etag}`.
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<'a> {
    pub ok: bool,
    pub value: &'a Value,
    pub etag: &'a str,
}

/// Strong, quoted ETag for a JSON value.
#[must_use]
pub fn etag_of(value: &Value) -> String {
    // serde_json::Value serialization cannot fail (string keys only).
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    format!("\"{}\"", sha256_hex(&bytes))
}

#[must_use]
pub fn with_cache(value: Value, if_none_match: Option<&str>) -> CacheOutcome {
    let etag = etag_of(&value);
    if if_none_match.is_some_and(|header| matches_etag(header, &etag)) {
        CacheOutcome::NotModified { etag }
    } else {
        CacheOutcome::Fresh { etag, body: value }
    }
}

/// `If-None-Match` comparison: comma-separated list, weak comparison,
/// `*` matches anything. Unquoted client values are tolerated.
#[must_use]
pub fn matches_etag(header: &str, etag: &str) -> bool {
    let bare = etag.trim_matches('"');
    header.split(',').map(str::trim).any(|candidate| {
        if candidate == "*" {
            return true;
        }
        let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
        candidate.trim_matches('"') == bare
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_same_etag() {
        let a = json!({"events": [1, 2, 3], "brand": "abc"});
        let b = json!({"events": [1, 2, 3], "brand": "abc"});
        assert_eq!(etag_of(&a), etag_of(&b));
        assert_ne!(etag_of(&a), etag_of(&json!({"events": []})));
    }

    #[test]
    fn matching_tag_is_not_modified() {
        let value = json!({"status": "ok"});
        let tag = etag_of(&value);
        let outcome = with_cache(value, Some(&tag));
        assert!(matches!(outcome, CacheOutcome::NotModified { .. }));
        assert_eq!(outcome.etag(), tag);
    }

    #[test]
    fn stale_tag_is_fresh_with_matching_etag() {
        let value = json!({"status": "ok"});
        let outcome = with_cache(value.clone(), Some("stale"));
        match outcome {
            CacheOutcome::Fresh { etag, body } => {
                assert_eq!(etag, etag_of(&value));
                assert_eq!(body, value);
            }
            CacheOutcome::NotModified { .. } => panic!("expected fresh"),
        }
    }

    #[test]
    fn no_header_is_fresh() {
        assert!(matches!(
            with_cache(json!(1), None),
            CacheOutcome::Fresh { .. }
        ));
    }

    #[test]
    fn header_lists_weak_and_wildcard() {
        let tag = "\"abc\"";
        assert!(matches_etag("\"x\", W/\"abc\"", tag));
        assert!(matches_etag("abc", tag));
        assert!(matches_etag("*", tag));
        assert!(!matches_etag("\"abcd\"", tag));
    }
}
