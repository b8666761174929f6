// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff import-tenants`: seeds tenants, channel credentials and agents.
//!
//! The file format is TOML:
//!
//! ```toml
//! [[tenants]]
//! id = "acme"
//! name = "Acme"
//! support_email = "support@acme.example"
//!
//! [tenants.business_hours]
//! timezone = "Europe/Berlin"
//! monday = { enabled = true, start = "09:00", end = "18:00" }
//!
//! [[tenants.channels]]
//! channel = "telegram"
//! token = "123:abc"
//! webhook_secret = "s3cret"
//!
//! [[tenants.agents]]
//! id = "maria"
//! name = "Maria"
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use handoff_config::HandoffConfig;
use handoff_core::types::{
    Agent, AgentRole, BusinessHours, ChannelCredential, ChannelKind, Tenant,
};
use handoff_core::{HandoffError, StorageAdapter};
use handoff_storage::SqliteStorage;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportFile {
    #[serde(default)]
    pub tenants: Vec<TenantEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub support_email: Option<String>,
    #[serde(default)]
    pub business_hours: Option<BusinessHours>,
    #[serde(default)]
    pub knowledge_base: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelEntry {
    pub channel: ChannelKind,
    pub token: String,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// WhatsApp phone-number id.
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: AgentRole,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_role() -> AgentRole {
    AgentRole::Agent
}

fn default_active() -> bool {
    true
}

/// Counts of upserted records.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub tenants: usize,
    pub channels: usize,
    pub agents: usize,
}

pub fn parse_import(text: &str) -> Result<ImportFile, HandoffError> {
    let file: ImportFile = toml::from_str(text)
        .map_err(|e| HandoffError::Config(format!("invalid tenants file: {e}")))?;

    for tenant in &file.tenants {
        if tenant.id.trim().is_empty() {
            return Err(HandoffError::Config("tenant id must not be empty".into()));
        }
        if let Some(agent) = tenant.agents.iter().find(|a| a.id.trim().is_empty()) {
            return Err(HandoffError::Config(format!(
                "tenant {}: agent {:?} has an empty id",
                tenant.id, agent.name
            )));
        }
    }
    Ok(file)
}

/// Upserts everything in `file`. Re-running an import is harmless.
pub async fn apply_import(
    storage: &dyn StorageAdapter,
    file: &ImportFile,
) -> Result<ImportSummary, HandoffError> {
    let mut summary = ImportSummary::default();

    for entry in &file.tenants {
        storage
            .upsert_tenant(&Tenant {
                id: entry.id.clone(),
                name: entry.name.clone(),
                support_email: entry.support_email.clone(),
                business_hours: entry.business_hours.clone(),
                knowledge_base: entry.knowledge_base.clone(),
            })
            .await?;
        summary.tenants += 1;

        for channel in &entry.channels {
            storage
                .upsert_channel_credential(&ChannelCredential {
                    tenant_id: entry.id.clone(),
                    channel: channel.channel,
                    token: channel.token.clone(),
                    webhook_secret: channel.webhook_secret.clone(),
                    account_id: channel.account_id.clone(),
                })
                .await?;
            summary.channels += 1;
        }

        for agent in &entry.agents {
            storage
                .upsert_agent(&Agent {
                    id: agent.id.clone(),
                    tenant_id: entry.id.clone(),
                    name: agent.name.clone(),
                    email: agent.email.clone(),
                    role: agent.role,
                    active: agent.active,
                })
                .await?;
            summary.agents += 1;
        }

        info!(
            tenant_id = %entry.id,
            channels = entry.channels.len(),
            agents = entry.agents.len(),
            "tenant imported"
        );
    }

    Ok(summary)
}

/// Runs the `handoff import-tenants` command.
pub async fn run_import(config: &HandoffConfig, path: &Path) -> Result<(), HandoffError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        HandoffError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    let file = parse_import(&text)?;

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let summary = apply_import(&storage, &file).await?;
    storage.close().await?;

    println!(
        "imported {} tenant(s), {} channel credential(s), {} agent(s)",
        summary.tenants, summary.channels, summary.agents
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_config::model::StorageConfig;

    const SAMPLE: &str = r#"
[[tenants]]
id = "acme"
name = "Acme"
support_email = "support@acme.example"
knowledge_base = "We sell anvils."

[tenants.business_hours]
timezone = "Europe/Berlin"
monday = { enabled = true, start = "09:00", end = "18:00" }

[[tenants.channels]]
channel = "telegram"
token = "123:abc"
webhook_secret = "s3cret"

[[tenants.channels]]
channel = "whatsapp"
token = "EAAG"
webhook_secret = "app-secret"
account_id = "10987654321"

[[tenants.agents]]
id = "maria"
name = "Maria"

[[tenants.agents]]
id = "boss"
name = "Boss"
role = "admin"
"#;

    async fn temp_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("import.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        (storage, dir)
    }

    #[test]
    fn parses_sample_with_defaults() {
        let file = parse_import(SAMPLE).unwrap();
        let tenant = &file.tenants[0];
        assert_eq!(tenant.channels.len(), 2);
        assert_eq!(tenant.channels[1].channel, ChannelKind::Whatsapp);
        assert_eq!(tenant.agents[0].role, AgentRole::Agent);
        assert!(tenant.agents[0].active);
        assert_eq!(tenant.agents[1].role, AgentRole::Admin);
        let hours = tenant.business_hours.as_ref().unwrap();
        assert!(hours.monday.as_ref().unwrap().enabled);
        assert!(hours.tuesday.is_none());
    }

    #[test]
    fn rejects_unknown_keys_and_empty_ids() {
        let err = parse_import("[[tenants]]\nid = \"a\"\nname = \"A\"\ncolour = \"red\"\n")
            .unwrap_err();
        assert!(matches!(err, HandoffError::Config(_)));

        let err = parse_import("[[tenants]]\nid = \" \"\nname = \"A\"\n").unwrap_err();
        assert!(err.to_string().contains("tenant id"));
    }

    #[tokio::test]
    async fn import_is_repeatable() {
        let (storage, _dir) = temp_storage().await;
        let file = parse_import(SAMPLE).unwrap();

        let first = apply_import(&storage, &file).await.unwrap();
        let second = apply_import(&storage, &file).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            ImportSummary {
                tenants: 1,
                channels: 2,
                agents: 2
            }
        );

        let tenant = storage.get_tenant("acme").await.unwrap().unwrap();
        assert_eq!(tenant.support_email.as_deref(), Some("support@acme.example"));
        let credential = storage
            .get_channel_credential("acme", ChannelKind::Whatsapp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(credential.account_id.as_deref(), Some("10987654321"));

        // Only the non-admin agent is eligible for conversations.
        let agents = storage.list_agents("acme").await.unwrap();
        assert_eq!(agents.len(), 2);
        let loads = storage.list_agent_loads("acme").await.unwrap();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].agent_id, "maria");
    }
}
