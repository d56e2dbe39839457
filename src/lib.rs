//! Frontdoor is the edge HTTP gateway in front of a hosted-script events
//! backend.
//!
//! It classifies every inbound request by brand and logical page, renders
//! HTML pages locally from a pre-built template bundle, and proxies JSON,
//! API and shortlink calls to the backend with enforced timeouts, a
//! bounded redirect budget, and a response classifier that turns the
//! backend's silent HTML failures into typed JSON errors.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Configuration loading and validation via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`brand`] -- Brand registry and brand resolution.
//! - [`routing`] -- Route table and request classification.
//! - [`templates`] -- Template bundle and local HTML rendering.
//! - [`proxy`] -- Gateway handler, upstream client, API whitelist and
//!   response classification.
//! - [`cache`] -- Content-hash ETags and conditional responses.
//! - [`security`] -- CORS and identity headers, admin key checks, and
//!   per-client rate limiting.
//! - [`error`] -- Process errors (`thiserror`) and the client-facing
//!   error taxonomy.
//! - [`health`] -- Local health endpoint.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Public items are consumed by the binary and integration tests only.
#![allow(clippy::missing_errors_doc)]

pub mod brand;
pub mod cache;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod routing;
pub mod security;
pub mod server;
pub mod templates;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
