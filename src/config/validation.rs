//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as a malformed upstream URL, out-of-range timeouts, missing
//! or duplicate brands, alias collisions, and an ambiguous default brand.
//! Returns a list of [`ValidationError`] values with per-field suggestions.

use std::collections::HashSet;

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

pub const MIN_TIMEOUT_MS: u64 = 15_000;
pub const MAX_TIMEOUT_MS: u64 = 30_000;

/// Validate the upstream base URL. Returns `Ok(())` or a human-readable error.
pub fn validate_base_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.fragment().is_some() {
                Err("base URL must not carry a fragment".into())
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Validate a brand id or alias. Returns `Ok(())` or a human-readable error.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("cannot be empty".into());
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "'{slug}' must contain only lowercase letters, digits, or '-'"
        ));
    }
    Ok(())
}

/// Validate a single timeout budget. Returns `Ok(())` or a human-readable error.
pub fn validate_timeout(ms: u64) -> Result<(), String> {
    if (MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&ms) {
        Ok(())
    } else {
        Err(format!(
            "{ms}ms is outside the allowed range {MIN_TIMEOUT_MS}-{MAX_TIMEOUT_MS}ms"
        ))
    }
}

fn root_error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        scope: "(root)".into(),
        field: field.into(),
        message: message.into(),
        suggestion: None,
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(msg) = validate_base_url(&config.upstream.base_url) {
        errors.push(root_error("upstream.base_url", msg));
    }

    let timeouts = &config.upstream.timeouts;
    for (field, ms) in [
        ("upstream.timeouts.json", timeouts.json),
        ("upstream.timeouts.api", timeouts.api),
        ("upstream.timeouts.shortlink", timeouts.shortlink),
    ] {
        if let Err(msg) = validate_timeout(ms) {
            errors.push(ValidationError {
                scope: "(root)".into(),
                field: field.into(),
                message: msg,
                suggestion: Some(format!(
                    "hosted-script backends need at least {}s",
                    MIN_TIMEOUT_MS / 1000
                )),
            });
        }
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(root_error(
            "rate_limit.max_requests",
            "quota must be greater than zero",
        ));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(root_error(
            "rate_limit.window_secs",
            "window must be greater than zero",
        ));
    }

    if config.brands.is_empty() {
        errors.push(root_error("brands", "at least one brand must be defined"));
        return Err(errors);
    }

    let ids: HashSet<&str> = config.brands.iter().map(|b| b.id.as_str()).collect();
    let mut seen_ids = HashSet::new();
    let mut seen_aliases = HashSet::new();

    for (i, brand) in config.brands.iter().enumerate() {
        let brand_id = if brand.id.is_empty() {
            format!("brands[{i}]")
        } else {
            format!("brand {}", brand.id)
        };

        if let Err(msg) = validate_slug(&brand.id) {
            errors.push(ValidationError {
                scope: brand_id.clone(),
                field: "id".into(),
                message: msg,
                suggestion: (!brand.id.is_empty())
                    .then(|| format!("did you mean '{}'?", brand.id.to_ascii_lowercase())),
            });
        }

        if !seen_ids.insert(brand.id.as_str()) {
            errors.push(ValidationError {
                scope: brand_id.clone(),
                field: "id".into(),
                message: "duplicate brand id".into(),
                suggestion: None,
            });
        }

        if brand.name.trim().is_empty() {
            errors.push(ValidationError {
                scope: brand_id.clone(),
                field: "name".into(),
                message: "display name cannot be empty".into(),
                suggestion: None,
            });
        }

        for alias in &brand.aliases {
            if let Err(msg) = validate_slug(alias) {
                errors.push(ValidationError {
                    scope: brand_id.clone(),
                    field: "aliases".into(),
                    message: msg,
                    suggestion: None,
                });
            }
            if alias != &brand.id && ids.contains(alias.as_str()) {
                errors.push(ValidationError {
                    scope: brand_id.clone(),
                    field: "aliases".into(),
                    message: format!("alias '{alias}' collides with another brand id"),
                    suggestion: None,
                });
            }
            if !seen_aliases.insert(alias.as_str()) {
                errors.push(ValidationError {
                    scope: brand_id.clone(),
                    field: "aliases".into(),
                    message: format!("alias '{alias}' is used by more than one brand"),
                    suggestion: None,
                });
            }
        }

        if brand.admin_key.as_deref().is_some_and(str::is_empty) {
            errors.push(ValidationError {
                scope: brand_id.clone(),
                field: "admin_key".into(),
                message: "admin key cannot be empty when set".into(),
                suggestion: Some("remove the field to disable mutating API calls".into()),
            });
        }
    }

    match config.brands.iter().filter(|b| b.default).count() {
        1 => {}
        0 => errors.push(ValidationError {
            scope: "(root)".into(),
            field: "brands".into(),
            message: "no brand is marked as default".into(),
            suggestion: Some("set `default: true` on exactly one brand".into()),
        }),
        n => errors.push(root_error(
            "brands",
            format!("{n} brands marked as default, exactly 1 allowed"),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let timeouts = &config.upstream.timeouts;
    let mut lines = vec![
        format!("  upstream: {}", config.upstream.base_url),
        format!(
            "  timeouts: json {}ms, api {}ms, shortlink {}ms",
            timeouts.json, timeouts.api, timeouts.shortlink
        ),
        format!("  templates: {}", config.templates.dir.display()),
        format!("  {} brands\n", config.brands.len()),
    ];

    for brand in &config.brands {
        let marker = if brand.default { " (default)" } else { "" };
        lines.push(format!("  {}{}  -> {}", brand.id, marker, brand.name));
        if !brand.aliases.is_empty() {
            lines.push(format!("    aliases: {}", brand.aliases.join(", ")));
        }
        if !brand.hosts.is_empty() {
            lines.push(format!("    hosts: {}", brand.hosts.join(", ")));
        }
        let admin = if brand.admin_key.is_some() {
            "enabled"
        } else {
            "disabled"
        };
        lines.push(format!("    admin api: {admin}"));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{
        BrandConfig, Config, RateLimitConfig, TemplatesConfig, Timeouts, UpstreamConfig,
    };

    fn brand(id: &str, default: bool) -> BrandConfig {
        BrandConfig {
            id: id.into(),
            name: format!("{id} events"),
            default,
            aliases: vec![],
            hosts: vec![],
            admin_key: None,
        }
    }

    fn minimal_config() -> Config {
        Config {
            upstream: UpstreamConfig {
                base_url: "https://backend.example/exec".into(),
                timeouts: Timeouts::default(),
                max_redirects: 5,
            },
            templates: TemplatesConfig::default(),
            demo_mode: false,
            rate_limit: RateLimitConfig::default(),
            brands: vec![brand("root", true)],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn empty_brands_fails() {
        let mut config = minimal_config();
        config.brands.clear();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("at least one brand"));
    }

    #[test]
    fn missing_default_fails() {
        let mut config = minimal_config();
        config.brands = vec![brand("abc", false)];
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("no brand")));
    }

    #[test]
    fn multiple_defaults_fail() {
        let mut config = minimal_config();
        config.brands.push(brand("abc", true));
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("exactly 1")));
    }

    #[test]
    fn duplicate_ids_fail() {
        let mut config = minimal_config();
        config.brands.push(brand("root", false));
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn alias_colliding_with_id_fails() {
        let mut config = minimal_config();
        let mut abc = brand("abc", false);
        abc.aliases.push("root".into());
        config.brands.push(abc);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("collides")));
    }

    #[test]
    fn uppercase_id_suggests_lowercase() {
        let mut config = minimal_config();
        config.brands.push(brand("ABC", false));
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.suggestion.as_deref() == Some("did you mean 'abc'?")));
    }

    #[test]
    fn timeout_out_of_range_fails() {
        let mut config = minimal_config();
        config.upstream.timeouts.api = 5_000;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "upstream.timeouts.api"));
    }

    #[test]
    fn invalid_base_url_fails() {
        let mut config = minimal_config();
        config.upstream.base_url = "ftp://backend.example".into();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("unsupported scheme")));
    }

    #[test]
    fn zero_quota_fails() {
        let mut config = minimal_config();
        config.rate_limit.max_requests = 0;
        assert!(validate(&config).is_err());
    }
}
