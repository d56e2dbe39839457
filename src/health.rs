//! `GET /_frontdoor/health` endpoint handler.
//!
//! Answered locally, never proxied. Reports the build, uptime, config
//! metadata, template bundle completeness, and cumulative request
//! counters. The status is `degraded` while the bundle is missing pages.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    /// Scheme and host only; the backend path may carry a deployment id.
    pub upstream: String,
    pub brands: usize,
    pub brand_ids: Vec<String>,
    /// Page aliases in the static route table.
    pub routes: usize,
    pub templates: usize,
    pub missing_templates: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub pages_rendered: u64,
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_rejected: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let missing: Vec<String> = state
        .templates
        .missing_pages()
        .into_iter()
        .map(|p| p.as_str().to_string())
        .collect();

    let status = if missing.is_empty() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: format!(
            "{} ({})",
            env!("FRONTDOOR_GIT_SHORT"),
            env!("FRONTDOOR_BUILD_PROFILE")
        ),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: state.config_source.clone(),
            version: state.config_version.short().to_string(),
            upstream: state.upstream_base.origin().ascii_serialization(),
            brands: state.brands.len(),
            brand_ids: state.brands.iter().map(|b| b.id.clone()).collect(),
            routes: state.routes.entries().count(),
            templates: state.templates.len(),
            missing_templates: missing,
        },
        stats: StatsResponse {
            pages_rendered: state.stats.rendered.load(Ordering::Relaxed),
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            requests_rejected: state.stats.rejected.load(Ordering::Relaxed),
        },
    })
}
