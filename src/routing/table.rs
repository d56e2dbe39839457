//! The static route table: public path aliases to logical pages.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalPage {
    Public,
    Admin,
    Display,
    Poster,
    Report,
    Status,
    Ping,
    Api,
    Shortlink,
}

impl LogicalPage {
    pub const HTML_PAGES: [Self; 5] = [
        Self::Public,
        Self::Admin,
        Self::Display,
        Self::Poster,
        Self::Report,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Admin => "admin",
            Self::Display => "display",
            Self::Poster => "poster",
            Self::Report => "report",
            Self::Status => "status",
            Self::Ping => "ping",
            Self::Api => "api",
            Self::Shortlink => "shortlink",
        }
    }

    /// Parse a template file stem into an HTML page.
    #[must_use]
    pub fn from_template_name(name: &str) -> Option<Self> {
        Self::HTML_PAGES
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for LogicalPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Html,
    Json,
    Api,
    Shortlink,
}

impl RouteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Api => "api",
            Self::Shortlink => "shortlink",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub path_segment: &'static str,
    pub logical_page: LogicalPage,
    pub kind: RouteKind,
}

const fn entry(path_segment: &'static str, logical_page: LogicalPage, kind: RouteKind) -> RouteEntry {
    RouteEntry {
        path_segment,
        logical_page,
        kind,
    }
}

pub const API_PREFIX: &str = "api";

/// Every public alias the gateway answers to. Segments are lowercase.
pub const ROUTES: &[RouteEntry] = &[
    entry("events", LogicalPage::Public, RouteKind::Html),
    entry("public", LogicalPage::Public, RouteKind::Html),
    entry("manage", LogicalPage::Admin, RouteKind::Html),
    entry("admin", LogicalPage::Admin, RouteKind::Html),
    entry("display", LogicalPage::Display, RouteKind::Html),
    entry("tv", LogicalPage::Display, RouteKind::Html),
    entry("poster", LogicalPage::Poster, RouteKind::Html),
    entry("posters", LogicalPage::Poster, RouteKind::Html),
    entry("flyer", LogicalPage::Poster, RouteKind::Html),
    entry("report", LogicalPage::Report, RouteKind::Html),
    entry("reports", LogicalPage::Report, RouteKind::Html),
    entry("analytics", LogicalPage::Report, RouteKind::Html),
    entry("status", LogicalPage::Status, RouteKind::Json),
    entry("health", LogicalPage::Status, RouteKind::Json),
    entry("ping", LogicalPage::Ping, RouteKind::Json),
    entry(API_PREFIX, LogicalPage::Api, RouteKind::Api),
    entry("r", LogicalPage::Shortlink, RouteKind::Shortlink),
    entry("redirect", LogicalPage::Shortlink, RouteKind::Shortlink),
];

/// Read-only lookup over [`ROUTES`], built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    by_segment: HashMap<&'static str, RouteEntry>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RouteTable {
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_entries(ROUTES)
    }

    #[must_use]
    pub fn from_entries(entries: &[RouteEntry]) -> Self {
        let by_segment = entries.iter().map(|e| (e.path_segment, *e)).collect();
        Self { by_segment }
    }

    /// Case-insensitive exact match on a single path segment.
    #[must_use]
    pub fn lookup(&self, segment: &str) -> Option<&RouteEntry> {
        if segment.bytes().any(|b| b.is_ascii_uppercase()) {
            self.by_segment.get(segment.to_ascii_lowercase().as_str())
        } else {
            self.by_segment.get(segment)
        }
    }

    #[must_use]
    pub fn is_page_alias(&self, segment: &str) -> bool {
        self.lookup(segment).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.by_segment.values()
    }
}
