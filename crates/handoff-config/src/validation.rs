// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::HandoffConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Platform limit on reply buttons in one message (WhatsApp interactive buttons).
pub const MAX_MENU_BUTTONS: usize = 3;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &HandoffConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        fail("server.bind_address must not be empty".to_string());
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.bind_address `{addr}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.server.max_body_bytes == 0 {
        fail("server.max_body_bytes must be greater than 0".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    for (key, value) in [
        ("telegram.timeout_secs", config.telegram.timeout_secs),
        ("whatsapp.timeout_secs", config.whatsapp.timeout_secs),
        ("enrichment.timeout_secs", config.enrichment.timeout_secs),
        ("email.timeout_secs", config.email.timeout_secs),
        ("routing.send_timeout_secs", config.routing.send_timeout_secs),
        ("routing.ticket_timeout_secs", config.routing.ticket_timeout_secs),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than 0"));
        }
    }

    if config.enrichment.knowledge_max_chars == 0 {
        fail("enrichment.knowledge_max_chars must be greater than 0".to_string());
    }

    if config.email.smtp_host.is_some() && config.email.from_address.is_none() {
        fail("email.from_address is required when email.smtp_host is set".to_string());
    }
    if config.email.username.is_some() != config.email.password.is_some() {
        fail("email.username and email.password must be set together".to_string());
    }

    let buttons = &config.routing.welcome_menu.buttons;
    if buttons.is_empty() || buttons.len() > MAX_MENU_BUTTONS {
        fail(format!(
            "routing.welcome_menu.buttons must have between 1 and {MAX_MENU_BUTTONS} entries, got {}",
            buttons.len()
        ));
    }
    for (i, button) in buttons.iter().enumerate() {
        if button.label.trim().is_empty() || button.payload.trim().is_empty() {
            fail(format!(
                "routing.welcome_menu.buttons[{i}] must have a non-empty label and payload"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MenuButtonConfig;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&HandoffConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = HandoffConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn smtp_host_requires_from_address() {
        let mut config = HandoffConfig::default();
        config.email.smtp_host = Some("smtp.example.com".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "from_address"));

        config.email.from_address = Some("bot@example.com".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn welcome_menu_button_count_is_bounded() {
        let mut config = HandoffConfig::default();
        config.routing.welcome_menu.buttons.clear();
        assert!(has_error(
            &validate_config(&config).unwrap_err(),
            "welcome_menu.buttons"
        ));

        config.routing.welcome_menu.buttons = (0..4)
            .map(|i| MenuButtonConfig {
                label: format!("Option {i}"),
                payload: format!("menu:{i}"),
            })
            .collect();
        assert!(has_error(
            &validate_config(&config).unwrap_err(),
            "between 1 and 3"
        ));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = HandoffConfig::default();
        config.server.bind_address = String::new();
        config.routing.send_timeout_secs = 0;
        config.service.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_error(&errors, "bind_address"));
        assert!(has_error(&errors, "routing.send_timeout_secs"));
        assert!(has_error(&errors, "log_level"));
    }

    #[test]
    fn bind_address_rejects_garbage() {
        let mut config = HandoffConfig::default();
        config.server.bind_address = "not an/address".into();
        assert!(has_error(
            &validate_config(&config).unwrap_err(),
            "not a valid IP"
        ));
    }
}
