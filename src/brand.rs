//! Multi-tenant brand resolution.
//!
//! [`BrandRegistry`] is built once from config and answers "which tenant
//! is this request for?". Resolution never fails: an explicit path
//! prefix wins, then a `?brand=` / `?tenant=` query parameter, then the
//! `Host` header mapping, and finally the default brand.

use std::collections::HashMap;

use crate::config::model::BrandConfig;

pub const FALLBACK_BRAND_ID: &str = "default";

pub struct Brand {
    pub id: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub hosts: Vec<String>,
    admin_key: Option<String>,
}

impl Brand {
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            aliases: Vec::new(),
            hosts: Vec::new(),
            admin_key: None,
        }
    }

    #[must_use]
    pub fn admin_key(&self) -> Option<&str> {
        self.admin_key.as_deref()
    }
}

// Manual impl so the admin secret never reaches logs.
impl std::fmt::Debug for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brand")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("aliases", &self.aliases)
            .field("hosts", &self.hosts)
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl From<&BrandConfig> for Brand {
    fn from(cfg: &BrandConfig) -> Self {
        Self {
            id: cfg.id.to_ascii_lowercase(),
            display_name: cfg.name.clone(),
            aliases: cfg.aliases.iter().map(|a| a.to_ascii_lowercase()).collect(),
            hosts: cfg.hosts.iter().map(|h| normalize_host(h)).collect(),
            admin_key: cfg.admin_key.clone(),
        }
    }
}

/// Where a brand was resolved from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrandSource {
    PathPrefix,
    QueryParam,
    Host,
    Default,
}

impl BrandSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PathPrefix => "path",
            Self::QueryParam => "query",
            Self::Host => "host",
            Self::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct Resolution<'b, 's> {
    pub brand: &'b Brand,
    pub source: BrandSource,
    pub remaining: &'s [&'s str],
}

#[derive(Debug)]
pub struct BrandRegistry {
    brands: Vec<Brand>,
    default_idx: usize,
    by_slug: HashMap<String, usize>,
    by_host: HashMap<String, usize>,
}

impl BrandRegistry {
    /// Build the registry from validated config.
    ///
    /// If no brand is configured a synthetic `default` brand is inserted so
    /// that resolution always has somewhere to land.
    #[must_use]
    pub fn from_config(brands: &[BrandConfig]) -> Self {
        let default_idx = brands.iter().position(|b| b.default).unwrap_or(0);
        Self::new(brands.iter().map(Brand::from).collect(), default_idx)
    }

    #[must_use]
    pub fn new(mut brands: Vec<Brand>, default_idx: usize) -> Self {
        if brands.is_empty() {
            brands.push(Brand::new(FALLBACK_BRAND_ID, "Events"));
        }
        let default_idx = default_idx.min(brands.len() - 1);

        let mut by_slug = HashMap::new();
        let mut by_host = HashMap::new();
        for (idx, brand) in brands.iter().enumerate() {
            by_slug.entry(brand.id.to_ascii_lowercase()).or_insert(idx);
            for alias in &brand.aliases {
                by_slug.entry(alias.to_ascii_lowercase()).or_insert(idx);
            }
            for host in &brand.hosts {
                by_host.entry(normalize_host(host)).or_insert(idx);
            }
        }

        Self {
            brands,
            default_idx,
            by_slug,
            by_host,
        }
    }

    #[must_use]
    pub fn default_brand(&self) -> &Brand {
        &self.brands[self.default_idx]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.brands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Brand> {
        self.brands.iter()
    }

    /// Look up a brand by id or alias, case-insensitively.
    #[must_use]
    pub fn by_slug(&self, slug: &str) -> Option<&Brand> {
        self.by_slug
            .get(&slug.to_ascii_lowercase())
            .map(|&idx| &self.brands[idx])
    }

    /// Look up a brand by `Host` header value. The port is ignored.
    #[must_use]
    pub fn by_host(&self, host: &str) -> Option<&Brand> {
        self.by_host
            .get(&normalize_host(host))
            .map(|&idx| &self.brands[idx])
    }

    /// Resolve the brand for a request.
    ///
    /// `is_page` reports whether a segment is a known page alias. A first
    /// segment that is both a brand and a page alias is only consumed as a
    /// brand when the segment after it is also a page alias.
    pub fn resolve<'b, 's>(
        &'b self,
        segments: &'s [&'s str],
        host: Option<&str>,
        query_brand: Option<&str>,
        is_page: impl Fn(&str) -> bool,
    ) -> Resolution<'b, 's> {
        if let Some((first, rest)) = segments.split_first() {
            if let Some(brand) = self.by_slug(first) {
                let ambiguous = is_page(first);
                let next_is_page = rest.first().is_some_and(|s| is_page(s));
                if !ambiguous || next_is_page {
                    return Resolution {
                        brand,
                        source: BrandSource::PathPrefix,
                        remaining: rest,
                    };
                }
            }
        }

        if let Some(brand) = query_brand.and_then(|q| self.by_slug(q)) {
            return Resolution {
                brand,
                source: BrandSource::QueryParam,
                remaining: segments,
            };
        }

        if let Some(brand) = host.and_then(|h| self.by_host(h)) {
            return Resolution {
                brand,
                source: BrandSource::Host,
                remaining: segments,
            };
        }

        Resolution {
            brand: self.default_brand(),
            source: BrandSource::Default,
            remaining: segments,
        }
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    // Bracketed IPv6 literals keep their colons.
    let without_port = if let Some(end) = host.strip_prefix('[').and_then(|h| h.find(']')) {
        &host[..end + 2]
    } else {
        host.rsplit_once(':').map_or(host, |(h, _)| h)
    };
    without_port.trim_end_matches('.').to_ascii_lowercase()
}
