//! Serde data structures for the Frontdoor configuration file.
//!
//! Contains [`Config`] (the root), [`UpstreamConfig`], [`Timeouts`],
//! [`TemplatesConfig`], [`RateLimitConfig`], and [`BrandConfig`]. All types
//! derive `Serialize` and `Deserialize` with `deny_unknown_fields` for
//! strict parsing.

use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routing::RouteKind;

const fn default_timeout() -> u64 {
    20_000
}

const fn default_max_redirects() -> u8 {
    5
}

const fn default_max_requests() -> u32 {
    30
}

const fn default_window_secs() -> u64 {
    60
}

const fn default_lockout_secs() -> u64 {
    300
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default, skip_serializing_if = "is_false")]
    pub demo_mode: bool,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    pub brands: Vec<BrandConfig>,
}

impl Config {
    /// Restrict served brands to `ids`. The default brand is always kept.
    pub fn retain_brands(&mut self, ids: &[String]) {
        self.brands
            .retain(|b| b.default || ids.iter().any(|id| id.eq_ignore_ascii_case(&b.id)));
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    pub base_url: String,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: u8,
}

/// Per-route-kind timeout budgets in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    #[serde(default = "default_timeout")]
    pub json: u64,

    #[serde(default = "default_timeout")]
    pub api: u64,

    #[serde(default = "default_timeout")]
    pub shortlink: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            json: default_timeout(),
            api: default_timeout(),
            shortlink: default_timeout(),
        }
    }
}

impl Timeouts {
    #[must_use]
    pub const fn uniform(ms: u64) -> Self {
        Self {
            json: ms,
            api: ms,
            shortlink: ms,
        }
    }

    /// Budget for a proxied route kind. HTML is rendered locally and
    /// never waits on the backend; it shares the JSON budget for symmetry.
    #[must_use]
    pub const fn for_kind(&self, kind: RouteKind) -> u64 {
        match kind {
            RouteKind::Api => self.api,
            RouteKind::Shortlink => self.shortlink,
            RouteKind::Json | RouteKind::Html => self.json,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemplatesConfig {
    #[serde(default = "default_template_dir")]
    pub dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_template_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,

    /// Reverse proxies whose `X-Forwarded-For` header is believed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            lockout_secs: default_lockout_secs(),
            trusted_proxies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrandConfig {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<String>,
}
