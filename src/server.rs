//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared, read-only tables built at
//! startup plus the rate limiter and request counters), [`build_router`]
//! for constructing the Axum router with middleware layers,
//! [`build_http_client`] for the connection-pooled hyper client, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::net::IpAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{middleware, Router};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::brand::BrandRegistry;
use crate::config::model::{Config, Timeouts};
use crate::config::ConfigVersion;
use crate::error::FrontdoorError;
use crate::health::health_handler;
use crate::proxy;
use crate::proxy::client::UpstreamClient;
use crate::routing::RouteTable;
use crate::security::{self, rate_limit::RateLimiter};
use crate::templates::TemplateStore;

pub const HEALTH_PATH: &str = "/_frontdoor/health";

#[derive(Debug)]
pub struct Stats {
    pub rendered: AtomicU64,
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rendered: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub routes: RouteTable,
    pub brands: BrandRegistry,
    pub templates: TemplateStore,
    pub upstream: UpstreamClient,
    pub upstream_base: Url,
    pub timeouts: Timeouts,
    pub demo_mode: bool,
    pub rate_limiter: RateLimiter,
    pub trusted_proxies: Vec<IpAddr>,
    pub config_source: String,
    pub config_version: ConfigVersion,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    /// Build the read-only request tables from validated config.
    pub fn from_config(
        config: &Config,
        templates: TemplateStore,
        http_client: HttpClient,
        config_source: impl Into<String>,
        config_version: ConfigVersion,
    ) -> Result<Self, FrontdoorError> {
        let upstream_base =
            Url::parse(&config.upstream.base_url).map_err(|e| FrontdoorError::UriParse {
                source: Box::new(e),
            })?;

        Ok(Self {
            routes: RouteTable::builtin(),
            brands: BrandRegistry::from_config(&config.brands),
            templates,
            upstream: UpstreamClient::new(http_client, config.upstream.max_redirects),
            upstream_base,
            timeouts: config.upstream.timeouts.clone(),
            demo_mode: config.demo_mode,
            rate_limiter: RateLimiter::new(&config.rate_limit),
            trusted_proxies: config.rate_limit.trusted_proxies.clone(),
            config_source: config_source.into(),
            config_version,
            start_time: Instant::now(),
            stats: Stats::new(),
        })
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in (e.g. `--all-features`
    // enables both `ring` and `aws-lc-rs`), rustls cannot auto-detect which one
    // to use. Explicitly install `ring` as the default provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .fallback(proxy::gateway_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(security::edge_headers))
                .layer(DefaultBodyLimit::max(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
