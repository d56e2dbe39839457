//! Request classification.
//!
//! [`classify`] decides what a request is before anything else happens:
//! a locally rendered HTML page, a proxied JSON status call, an API/RPC
//! call, a shortlink redirect, or unroutable. It strips an optional brand
//! prefix via the [`BrandRegistry`], then matches the first remaining
//! segment against the static [`RouteTable`]. Unroutable requests never
//! reach the backend.

pub mod query;
pub mod table;

use axum::http::Method;

pub use query::Query;
pub use table::{LogicalPage, RouteEntry, RouteKind, RouteTable, API_PREFIX, ROUTES};

use crate::brand::{Brand, BrandRegistry, BrandSource};

/// What the request resolved to, independent of brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Matched {
        page: LogicalPage,
        kind: RouteKind,
        /// The `api/<action>` or `r/<token>` argument segment.
        argument: Option<String>,
    },
    Unroutable,
}

#[derive(Debug)]
pub struct Classification<'b> {
    pub brand: &'b Brand,
    pub brand_source: BrandSource,
    pub target: Target,
}

impl Classification<'_> {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.target, Target::Matched { .. })
    }

    #[must_use]
    pub const fn kind(&self) -> Option<RouteKind> {
        match self.target {
            Target::Matched { kind, .. } => Some(kind),
            Target::Unroutable => None,
        }
    }

    #[must_use]
    pub const fn logical_page(&self) -> Option<LogicalPage> {
        match self.target {
            Target::Matched { page, .. } => Some(page),
            Target::Unroutable => None,
        }
    }

    #[must_use]
    pub const fn is_api_request(&self) -> bool {
        matches!(self.kind(), Some(RouteKind::Api))
    }

    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        match &self.target {
            Target::Matched { argument, .. } => argument.as_deref(),
            Target::Unroutable => None,
        }
    }
}

pub struct RequestTarget<'r> {
    pub path: &'r str,
    pub method: &'r Method,
    pub query: &'r Query,
    pub host: Option<&'r str>,
}

#[must_use]
pub fn classify<'b>(
    table: &RouteTable,
    brands: &'b BrandRegistry,
    req: &RequestTarget<'_>,
) -> Classification<'b> {
    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();
    let query_brand = req.query.get("brand").or_else(|| req.query.get("tenant"));

    let resolution = brands.resolve(&segments, req.host, query_brand, |s| {
        table.is_page_alias(s)
    });

    let target = match_target(table, req, resolution.remaining);

    Classification {
        brand: resolution.brand,
        brand_source: resolution.source,
        target,
    }
}

fn match_target(table: &RouteTable, req: &RequestTarget<'_>, remaining: &[&str]) -> Target {
    // POST to the API prefix is always an API call, whatever else the path says.
    if req.method == Method::POST {
        if let Some(first) = remaining.first() {
            if first.eq_ignore_ascii_case(API_PREFIX) {
                return Target::Matched {
                    page: LogicalPage::Api,
                    kind: RouteKind::Api,
                    argument: remaining.get(1).map(|s| (*s).to_string()),
                };
            }
        }
    }

    let Some((first, rest)) = remaining.split_first() else {
        return match_root(table, req);
    };

    let Some(entry) = table.lookup(first) else {
        return Target::Unroutable;
    };

    if !method_allowed(entry.kind, req.method) {
        return Target::Unroutable;
    }

    match entry.kind {
        RouteKind::Api if rest.len() <= 1 => Target::Matched {
            page: entry.logical_page,
            kind: entry.kind,
            argument: rest.first().map(|s| (*s).to_string()),
        },
        RouteKind::Shortlink if rest.len() <= 1 => Target::Matched {
            page: entry.logical_page,
            kind: entry.kind,
            argument: rest
                .first()
                .map(|s| (*s).to_string())
                .or_else(|| shortlink_token(req.query)),
        },
        RouteKind::Html | RouteKind::Json if rest.is_empty() => Target::Matched {
            page: entry.logical_page,
            kind: entry.kind,
            argument: None,
        },
        _ => Target::Unroutable,
    }
}

/// Root path: an explicit `?page=` / `?p=` parameter selects the page,
/// otherwise the public page is served.
fn match_root(table: &RouteTable, req: &RequestTarget<'_>) -> Target {
    let explicit = req.query.get("page").or_else(|| req.query.get("p"));

    let entry = match explicit {
        None => table.lookup("public"),
        Some(alias) => table.lookup(alias),
    };

    match entry {
        Some(entry) if method_allowed(entry.kind, req.method) => Target::Matched {
            page: entry.logical_page,
            kind: entry.kind,
            argument: match entry.kind {
                RouteKind::Shortlink => shortlink_token(req.query),
                RouteKind::Api => req.query.get("action").map(str::to_string),
                RouteKind::Html | RouteKind::Json => None,
            },
        },
        _ => Target::Unroutable,
    }
}

fn shortlink_token(query: &Query) -> Option<String> {
    query
        .get("t")
        .or_else(|| query.get("token"))
        .map(str::to_string)
}

fn method_allowed(kind: RouteKind, method: &Method) -> bool {
    match kind {
        RouteKind::Api => *method == Method::GET || *method == Method::POST,
        RouteKind::Html | RouteKind::Json | RouteKind::Shortlink => {
            *method == Method::GET || *method == Method::HEAD
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brand::Brand;

    fn brands() -> BrandRegistry {
        BrandRegistry::new(
            vec![Brand::new("default", "Community Events"), Brand::new("abc", "ABC Club")],
            0,
        )
    }

    fn run<'b>(
        brands: &'b BrandRegistry,
        method: Method,
        path: &str,
        query: Option<&str>,
    ) -> Classification<'b> {
        let table = RouteTable::builtin();
        let query = Query::parse(query);
        classify(
            &table,
            brands,
            &RequestTarget {
                path,
                method: &method,
                query: &query,
                host: None,
            },
        )
    }

    #[test]
    fn empty_path_is_public() {
        let b = brands();
        let c = run(&b, Method::GET, "/", None);
        assert_eq!(c.logical_page(), Some(LogicalPage::Public));
        assert_eq!(c.kind(), Some(RouteKind::Html));
        assert_eq!(c.brand.id, "default");
    }

    #[test]
    fn explicit_page_parameter() {
        let b = brands();
        let c = run(&b, Method::GET, "/", Some("page=manage"));
        assert_eq!(c.logical_page(), Some(LogicalPage::Admin));
        let c = run(&b, Method::GET, "/", Some("p=status"));
        assert_eq!(c.kind(), Some(RouteKind::Json));
        let c = run(&b, Method::GET, "/", Some("p=bogus"));
        assert!(!c.is_valid());
    }

    #[test]
    fn shortlink_query_form() {
        let b = brands();
        let c = run(&b, Method::GET, "/", Some("p=r&t=abc123"));
        assert_eq!(c.kind(), Some(RouteKind::Shortlink));
        assert_eq!(c.argument(), Some("abc123"));
    }

    #[test]
    fn shortlink_path_form() {
        let b = brands();
        let c = run(&b, Method::GET, "/abc/r/xyz", None);
        assert_eq!(c.kind(), Some(RouteKind::Shortlink));
        assert_eq!(c.argument(), Some("xyz"));
        assert_eq!(c.brand.id, "abc");
    }

    #[test]
    fn post_to_api_prefix_is_api() {
        let b = brands();
        let c = run(&b, Method::POST, "/api/listEvents", None);
        assert!(c.is_api_request());
        assert_eq!(c.argument(), Some("listEvents"));

        let c = run(&b, Method::POST, "/abc/api/a/b/c", None);
        assert!(c.is_api_request());
        assert_eq!(c.brand.id, "abc");
    }

    #[test]
    fn extra_segments_after_page_are_unroutable() {
        let b = brands();
        assert!(!run(&b, Method::GET, "/manage/extra", None).is_valid());
    }

    #[test]
    fn post_to_html_page_is_unroutable() {
        let b = brands();
        assert!(!run(&b, Method::POST, "/events", None).is_valid());
    }

    #[test]
    fn trailing_slash_and_case_are_ignored() {
        let b = brands();
        let c = run(&b, Method::GET, "/ABC/Manage/", None);
        assert_eq!(c.brand.id, "abc");
        assert_eq!(c.logical_page(), Some(LogicalPage::Admin));
    }
}
