//! `frontdoor run`: start the gateway.
//!
//! Loads the config file, applies CLI/env overrides and per-brand admin
//! secrets, loads the template bundle, then serves until SIGTERM or
//! Ctrl+C. Everything built here is read-only for the life of the
//! process; restarting is the only way to change it.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::model::{Config, Timeouts};
use crate::config::{sources, validation, ConfigSource};
use crate::error::FrontdoorError;
use crate::logging;
use crate::server::{self, AppState};
use crate::templates::TemplateStore;

/// Prefix of the per-brand admin secret variables.
pub const ADMIN_KEY_ENV_PREFIX: &str = "FRONTDOOR_ADMIN_KEY_";

pub async fn execute(args: RunArgs) -> Result<(), FrontdoorError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let (path, source) = resolve_file_source(args.config.as_deref()).await?;
    let (mut config, version) = source.load().await?;

    apply_overrides(&mut config, &args);
    apply_admin_keys(&mut config, |name| std::env::var(name).ok());
    if let Err(errors) = validation::validate(&config) {
        return Err(FrontdoorError::ConfigValidation { errors });
    }

    let template_dir = resolve_template_dir(&config, &path, args.template_dir.as_deref());
    let templates = TemplateStore::load_dir(&template_dir).await?;

    let source_name = format!("{}:{}", source.name(), path.display());
    let state = Arc::new(AppState::from_config(
        &config,
        templates,
        server::build_http_client(),
        source_name,
        version,
    )?);

    let brand_count = state.brands.len();
    let template_count = state.templates.len();
    let config_version = state.config_version.short().to_string();
    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        brands = brand_count,
        templates = template_count,
        config_version = %config_version,
        template_dir = %template_dir.display(),
        "frontdoor started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    tracing::info!("frontdoor stopped");
    Ok(())
}

/// Apply flag/env overrides on top of the file config.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(ref url) = args.upstream_url {
        config.upstream.base_url.clone_from(url);
    }
    if let Some(ms) = args.timeout {
        config.upstream.timeouts = Timeouts::uniform(ms);
    }
    let valid: Vec<String> = args
        .valid_brands
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !valid.is_empty() {
        config.retain_brands(&valid);
    }
}

/// Fill each brand's admin key from `FRONTDOOR_ADMIN_KEY_<ID>` when set.
///
/// The id is upper-cased with `-` mapped to `_`. An empty value leaves
/// the file's key in place.
pub fn apply_admin_keys(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    for brand in &mut config.brands {
        let var = admin_key_var(&brand.id);
        if let Some(key) = lookup(&var).filter(|k| !k.is_empty()) {
            tracing::debug!(brand = %brand.id, var = %var, "admin key taken from environment");
            brand.admin_key = Some(key);
        }
    }
}

#[must_use]
pub fn admin_key_var(brand_id: &str) -> String {
    let suffix: String = brand_id
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect();
    format!("{ADMIN_KEY_ENV_PREFIX}{suffix}")
}

/// An explicit override is used as given; a relative config value is
/// resolved against the config file's directory.
#[must_use]
pub fn resolve_template_dir(config: &Config, config_path: &Path, explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    let dir = &config.templates.dir;
    if dir.is_absolute() {
        return dir.clone();
    }
    config_path
        .parent()
        .map_or_else(|| dir.clone(), |parent| parent.join(dir))
}

async fn resolve_file_source(
    explicit: Option<&Path>,
) -> Result<(PathBuf, Box<dyn ConfigSource>), FrontdoorError> {
    if let Some(path) = explicit {
        return create_file_source(path).map(|s| (path.to_path_buf(), s));
    }

    let candidates = [
        "frontdoor.yaml",
        "frontdoor.yml",
        "frontdoor.json",
        "frontdoor.toml",
    ];

    for name in &candidates {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            let source = create_file_source(&path)?;
            return Ok((path, source));
        }
    }

    Err(FrontdoorError::NoConfigSource {
        hint: "Provide --config <file> or place frontdoor.yaml in the working directory.\n  \
               See example/frontdoor.yaml for a starting point."
            .into(),
    })
}

fn create_file_source(path: &Path) -> Result<Box<dyn ConfigSource>, FrontdoorError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(sources::yaml::new(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(sources::json::new(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(sources::toml_source::new(path.to_path_buf()))),

        other => Err(FrontdoorError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{BrandConfig, UpstreamConfig};

    fn config() -> Config {
        Config {
            upstream: UpstreamConfig {
                base_url: "https://backend.example/exec".into(),
                timeouts: Timeouts::default(),
                max_redirects: 5,
            },
            templates: Default::default(),
            demo_mode: false,
            rate_limit: Default::default(),
            brands: vec![
                BrandConfig {
                    id: "root".into(),
                    name: "Root".into(),
                    default: true,
                    aliases: vec![],
                    hosts: vec![],
                    admin_key: None,
                },
                BrandConfig {
                    id: "north-side".into(),
                    name: "North Side".into(),
                    default: false,
                    aliases: vec![],
                    hosts: vec![],
                    admin_key: Some("from-file".into()),
                },
            ],
        }
    }

    #[test]
    fn admin_key_var_is_upper_snake() {
        assert_eq!(admin_key_var("north-side"), "FRONTDOOR_ADMIN_KEY_NORTH_SIDE");
        assert_eq!(admin_key_var("abc"), "FRONTDOOR_ADMIN_KEY_ABC");
    }

    #[test]
    fn env_admin_keys_override_file() {
        let mut cfg = config();
        apply_admin_keys(&mut cfg, |var| match var {
            "FRONTDOOR_ADMIN_KEY_ROOT" => Some("root-secret".into()),
            "FRONTDOOR_ADMIN_KEY_NORTH_SIDE" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.brands[0].admin_key.as_deref(), Some("root-secret"));
        assert_eq!(cfg.brands[1].admin_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn relative_template_dir_follows_config_file() {
        let cfg = config();
        let dir = resolve_template_dir(&cfg, Path::new("deploy/frontdoor.yaml"), None);
        assert_eq!(dir, PathBuf::from("deploy/templates"));
        let dir = resolve_template_dir(&cfg, Path::new("deploy/frontdoor.yaml"), Some(Path::new("/srv/t")));
        assert_eq!(dir, PathBuf::from("/srv/t"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = create_file_source(Path::new("frontdoor.ini")).err().unwrap();
        assert!(matches!(err, FrontdoorError::UnsupportedFormat(ext) if ext == "ini"));
    }
}
