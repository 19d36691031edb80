//! Tests for configuration loading

use plexgate_core::config::{load_from_json, load_from_yaml, ConfigError};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn load_minimal_yaml() {
    let file = write_temp("version: \"0.1\"\n");
    let config = load_from_yaml(file.path()).unwrap();
    assert_eq!(config.engine.base_url, "https://www.perplexity.ai");
    assert_eq!(config.engine.language, "en-US");
    assert!(!config.session.account_bound());
}

#[test]
fn load_yaml_with_cookies() {
    let file = write_temp(
        r#"
version: "0.1"
engine:
  base_url: "https://engine.example.com"
session:
  cookies:
    session-token: "abc123"
    visitor-id: "v-1"
  pro_queries: 5
"#,
    );
    let config = load_from_yaml(file.path()).unwrap();
    assert!(config.session.account_bound());
    assert_eq!(config.session.pro_queries, Some(5));
    assert_eq!(
        config.session.cookies["session-token"].expose_secret(),
        "abc123"
    );
}

#[test]
fn env_placeholders_are_interpolated() {
    std::env::set_var("PLEXGATE_CFG_TEST_TOKEN", "from-env");
    let file = write_temp(
        r#"
version: "0.1"
session:
  cookies:
    session-token: "${PLEXGATE_CFG_TEST_TOKEN}"
"#,
    );
    let config = load_from_yaml(file.path()).unwrap();
    assert_eq!(
        config.session.cookies["session-token"].expose_secret(),
        "from-env"
    );
    std::env::remove_var("PLEXGATE_CFG_TEST_TOKEN");
}

#[test]
fn missing_env_var_fails_the_load() {
    let file = write_temp(
        r#"
version: "0.1"
session:
  cookies:
    session-token: "${PLEXGATE_CFG_TEST_ABSENT}"
"#,
    );
    let err = load_from_yaml(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::EnvVarNotFound { var } if var == "PLEXGATE_CFG_TEST_ABSENT"));
}

#[test]
fn unknown_fields_are_rejected() {
    let file = write_temp("version: \"0.1\"\nsurprise: true\n");
    assert!(matches!(
        load_from_yaml(file.path()),
        Err(ConfigError::ParseError { .. })
    ));
}

#[test]
fn bad_version_fails_validation() {
    let file = write_temp("version: \"9.9\"\n");
    assert!(matches!(
        load_from_yaml(file.path()),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn load_json_config() {
    let file = write_temp(
        r#"{
  "version": "0.1",
  "engine": {"base_url": "http://localhost:8080", "language": "en-US"},
  "connection": {"first_byte_timeout_ms": 30000}
}"#,
    );
    let config = load_from_json(file.path()).unwrap();
    assert_eq!(config.engine.base_url, "http://localhost:8080");
    assert_eq!(config.connection.first_byte_timeout_ms, 30000);
}

#[test]
fn debug_output_never_leaks_cookie_values() {
    let file = write_temp(
        r#"
version: "0.1"
session:
  cookies:
    session-token: "super-secret-cookie-value"
"#,
    );
    let config = load_from_yaml(file.path()).unwrap();
    let debug = format!("{config:?}");
    assert!(!debug.contains("super-secret-cookie-value"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_from_yaml("/nonexistent/plexgate.yaml"),
        Err(ConfigError::IoError { .. })
    ));
}
