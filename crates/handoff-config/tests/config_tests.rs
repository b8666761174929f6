// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Handoff configuration system.

use std::io::Write;

use handoff_config::diagnostic::ConfigError;
use handoff_config::model::HandoffConfig;
use handoff_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};
use serial_test::serial;

#[test]
fn valid_toml_deserializes_into_handoff_config() {
    let toml = r#"
[service]
name = "handoff-eu"
log_level = "debug"

[server]
bind_address = "0.0.0.0"
port = 9000

[storage]
database_path = "/tmp/handoff-test.db"
wal_mode = false

[telegram]
api_base_url = "http://localhost:8081"
timeout_secs = 3

[whatsapp]
api_version = "v20.0"

[enrichment]
gemini_api_key = "AIzaSyExampleExampleExampleExample12"
openai_api_key = "sk-test"
knowledge_max_chars = 2000

[email]
smtp_host = "smtp.example.com"
from_address = "bot@example.com"
username = "bot"
password = "hunter2"

[routing]
send_timeout_secs = 4

[routing.welcome_menu]
text = "Welcome!"
buttons = [
  { label = "Support", payload = "menu:support" },
  { label = "Agent", payload = "menu:agent" },
]

[prometheus]
enabled = true
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.service.name, "handoff-eu");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.server.bind_address, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.telegram.api_base_url, "http://localhost:8081");
    assert_eq!(config.telegram.timeout_secs, 3);
    assert_eq!(config.whatsapp.api_version, "v20.0");
    assert_eq!(config.whatsapp.api_base_url, "https://graph.facebook.com");
    assert_eq!(config.enrichment.knowledge_max_chars, 2000);
    assert_eq!(config.email.smtp_port, 587);
    assert_eq!(config.routing.send_timeout_secs, 4);
    assert_eq!(config.routing.welcome_menu.buttons.len(), 2);
    assert!(config.prometheus.enabled);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.service.log_level, "info");
    assert!(config.email.smtp_host.is_none());
    assert!(!config.prometheus.enabled);
    assert!(config.storage.database_path.ends_with("handoff.db"));
}

#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[enrichment]
gemni_api_key = "AIza..."
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("an UnknownKey diagnostic");
    assert_eq!(unknown.0, "gemni_api_key");
    assert_eq!(unknown.1.as_deref(), Some("gemini_api_key"));
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[telegarm]
timeout_secs = 5
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn wrong_type_produces_invalid_type_error() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).expect_err("port must be numeric");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. }))
    );
}

#[test]
fn validation_errors_surface_through_load() {
    let toml = r#"
[email]
smtp_host = "smtp.example.com"
"#;
    let errors = load_and_validate_str(toml).expect_err("from_address missing");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("from_address"))
    ));
}

#[test]
fn serialized_defaults_round_trip_through_toml() {
    let defaults = HandoffConfig::default();
    let rendered = toml::to_string(&defaults).expect("defaults serialize");
    let reparsed = load_config_from_str(&rendered).expect("rendered defaults parse");
    assert_eq!(reparsed.server.port, defaults.server.port);
    assert_eq!(
        reparsed.routing.welcome_menu.buttons,
        defaults.routing.welcome_menu.buttons
    );
}

#[test]
#[serial]
fn env_vars_override_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nport = 9000\n\n[enrichment]\ntimeout_secs = 12").unwrap();

    unsafe {
        std::env::set_var("HANDOFF_SERVER_PORT", "9100");
        std::env::set_var("HANDOFF_ENRICHMENT_OPENAI_API_KEY", "sk-from-env");
    }
    let result = load_config_from_path(file.path());
    unsafe {
        std::env::remove_var("HANDOFF_SERVER_PORT");
        std::env::remove_var("HANDOFF_ENRICHMENT_OPENAI_API_KEY");
    }

    let config = result.expect("config with env overrides");
    assert_eq!(config.server.port, 9100);
    assert_eq!(
        config.enrichment.openai_api_key.as_deref(),
        Some("sk-from-env")
    );
    assert_eq!(config.enrichment.timeout_secs, 12);
}

#[test]
#[serial]
fn load_and_validate_path_suggests_fix_for_typo() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nbind_adress = \"0.0.0.0\"").unwrap();

    let errors = load_and_validate_path(file.path()).expect_err("typo must be rejected");
    match &errors[0] {
        ConfigError::UnknownKey { suggestion, .. } => {
            assert_eq!(suggestion.as_deref(), Some("bind_address"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
