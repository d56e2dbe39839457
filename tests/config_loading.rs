//! Integration tests for config loading across all file formats.

use std::path::PathBuf;

use frontdoor::config::model::Config;
use frontdoor::config::sources::parse_config_str;
use frontdoor::config::validation::validate;
use frontdoor::config::ConfigSource;
use frontdoor::error::FrontdoorError;

fn load_example(name: &str) -> String {
    let path = format!("example/{name}");
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

#[test]
fn yaml_example_loads_and_validates() {
    let content = load_example("frontdoor.yaml");
    let config = parse_config_str("yaml", &content, "frontdoor.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.brands.len(), 3);
    assert_eq!(config.brands.iter().filter(|b| b.default).count(), 1);
    assert_eq!(config.upstream.timeouts.api, 30_000);
}

#[cfg(feature = "json")]
#[test]
fn json_example_loads_and_validates() {
    let content = load_example("frontdoor.json");
    let config = parse_config_str("json", &content, "frontdoor.json").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.brands.len(), 3);
}

#[cfg(feature = "toml")]
#[test]
fn toml_example_loads_and_validates() {
    let content = load_example("frontdoor.toml");
    let config = parse_config_str("toml", &content, "frontdoor.toml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.brands.len(), 3);
}

#[cfg(all(feature = "json", feature = "toml"))]
#[test]
fn all_formats_produce_equivalent_configs() {
    let yaml = parse_config_str("yaml", &load_example("frontdoor.yaml"), "yaml").unwrap();
    let json = parse_config_str("json", &load_example("frontdoor.json"), "json").unwrap();
    let toml = parse_config_str("toml", &load_example("frontdoor.toml"), "toml").unwrap();

    for other in [&json, &toml] {
        assert_eq!(yaml.upstream.base_url, other.upstream.base_url);
        let ids: Vec<_> = other.brands.iter().map(|b| &b.id).collect();
        assert_eq!(yaml.brands.iter().map(|b| &b.id).collect::<Vec<_>>(), ids);
    }
}

#[tokio::test]
async fn yaml_file_source_reports_hash_version() {
    let source = frontdoor::config::sources::yaml::new(PathBuf::from("example/frontdoor.yaml"));
    let (config, version) = source.load().await.unwrap();
    assert_eq!(source.name(), "yaml");
    assert_eq!(version.short().len(), 8);
    assert!(config.brands.iter().any(|b| b.id == "abc"));
}

#[tokio::test]
async fn missing_file_is_reported() {
    let source = frontdoor::config::sources::yaml::new(PathBuf::from("example/nope.yaml"));
    let err = source.load().await.unwrap_err();
    assert!(matches!(err, FrontdoorError::ConfigFileNotFound { .. }));
}

#[test]
fn unsupported_format_returns_error() {
    let result = parse_config_str("xml", "{}", "test.xml");
    assert!(result.is_err());
}

#[test]
fn unknown_fields_are_rejected() {
    let yaml = "upstream: { base_url: 'https://x.example/exec' }\nbrands: []\nroutes: []\n";
    assert!(parse_config_str("yaml", yaml, "bad.yaml").is_err());
}

#[test]
fn out_of_range_timeout_fails_validation() {
    let yaml = "
upstream:
  base_url: https://backend.example/exec
  timeouts: { json: 5000 }
brands:
  - { id: root, name: Root, default: true }
";
    let config: Config = parse_config_str("yaml", yaml, "t.yaml").unwrap();
    let errors = validate(&config).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "upstream.timeouts.json");
}

#[test]
fn valid_brands_keeps_default() {
    let mut config = parse_config_str("yaml", &load_example("frontdoor.yaml"), "y").unwrap();
    config.retain_brands(&["cbc".to_string()]);
    let ids: Vec<_> = config.brands.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["root", "cbc"]);
    validate(&config).unwrap();
}
