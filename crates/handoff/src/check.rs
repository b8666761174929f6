// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff check-config` output.

use handoff_config::HandoffConfig;

fn configured(value: &Option<String>) -> &'static str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => "configured",
        _ => "not configured",
    }
}

/// One line per section, with secrets reduced to configured / not configured.
pub fn summary(config: &HandoffConfig) -> String {
    let lines = [
        "configuration OK".to_string(),
        format!("  service:    {} (log level {})", config.service.name, config.service.log_level),
        format!(
            "  server:     {}:{} (max body {} bytes)",
            config.server.bind_address, config.server.port, config.server.max_body_bytes
        ),
        format!(
            "  storage:    {} (wal {})",
            config.storage.database_path, config.storage.wal_mode
        ),
        format!(
            "  enrichment: gemini {}, openai {}, timeout {}s",
            configured(&config.enrichment.gemini_api_key),
            configured(&config.enrichment.openai_api_key),
            config.enrichment.timeout_secs
        ),
        format!(
            "  email:      smtp {}",
            configured(&config.email.smtp_host)
        ),
        format!(
            "  metrics:    {}",
            if config.prometheus.enabled { "enabled" } else { "disabled" }
        ),
    ];
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_hides_secrets() {
        let mut config = HandoffConfig::default();
        config.enrichment.openai_api_key = Some("sk-very-secret".into());

        let text = summary(&config);
        assert!(text.starts_with("configuration OK"));
        assert!(text.contains("openai configured"));
        assert!(text.contains("gemini not configured"));
        assert!(!text.contains("sk-very-secret"));
    }
}
