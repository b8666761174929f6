// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use handoff_config::model::StorageConfig;
use handoff_core::types::{
    Agent, AgentLoad, ChannelCredential, ChannelKind, Contact, Conversation, Message, NewContact,
    NormalizedMessage, RecordedInbound, Tenant,
};
use handoff_core::{AdapterType, HandoffError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened lazily by [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, HandoffError> {
        self.db.get().ok_or_else(|| HandoffError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(db: &Database) -> Result<(), HandoffError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), HandoffError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| HandoffError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), HandoffError> {
        Self::checkpoint(self.db()?).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Tenants ---

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, HandoffError> {
        queries::tenants::get_tenant(self.db()?, tenant_id).await
    }

    async fn get_channel_credential(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
    ) -> Result<Option<ChannelCredential>, HandoffError> {
        queries::tenants::get_channel_credential(self.db()?, tenant_id, channel).await
    }

    async fn upsert_tenant(&self, tenant: &Tenant) -> Result<(), HandoffError> {
        queries::tenants::upsert_tenant(self.db()?, tenant).await
    }

    async fn upsert_channel_credential(
        &self,
        credential: &ChannelCredential,
    ) -> Result<(), HandoffError> {
        queries::tenants::upsert_channel_credential(self.db()?, credential).await
    }

    // --- Agents ---

    async fn upsert_agent(&self, agent: &Agent) -> Result<(), HandoffError> {
        queries::agents::upsert_agent(self.db()?, agent).await
    }

    async fn list_agents(&self, tenant_id: &str) -> Result<Vec<Agent>, HandoffError> {
        queries::agents::list_agents(self.db()?, tenant_id).await
    }

    async fn list_agent_loads(&self, tenant_id: &str) -> Result<Vec<AgentLoad>, HandoffError> {
        queries::agents::list_agent_loads(self.db()?, tenant_id).await
    }

    // --- Contacts ---

    async fn find_or_create_contact(&self, contact: &NewContact) -> Result<Contact, HandoffError> {
        queries::contacts::find_or_create_contact(self.db()?, contact).await
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Option<Contact>, HandoffError> {
        queries::contacts::get_contact(self.db()?, contact_id).await
    }

    async fn merge_contact_metadata(
        &self,
        contact_id: &str,
        patch: Map<String, Value>,
        tags: &[String],
    ) -> Result<(), HandoffError> {
        queries::contacts::merge_contact_metadata(self.db()?, contact_id, patch, tags).await
    }

    // --- Conversations ---

    async fn find_or_create_open_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        channel: ChannelKind,
    ) -> Result<(Conversation, bool), HandoffError> {
        queries::conversations::find_or_create_open_conversation(
            self.db()?,
            tenant_id,
            contact_id,
            channel,
        )
        .await
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        increment_unread: bool,
    ) -> Result<(), HandoffError> {
        queries::conversations::touch_conversation(self.db()?, conversation_id, increment_unread)
            .await
    }

    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<bool, HandoffError> {
        queries::conversations::assign_conversation(self.db()?, conversation_id, agent_id).await
    }

    async fn set_conversation_summary(
        &self,
        conversation_id: &str,
        summary: &str,
    ) -> Result<(), HandoffError> {
        queries::conversations::set_conversation_summary(self.db()?, conversation_id, summary)
            .await
    }

    // --- Messages ---

    async fn record_inbound(
        &self,
        tenant_id: &str,
        contact_id: &str,
        channel: ChannelKind,
        message: &NormalizedMessage,
    ) -> Result<Option<RecordedInbound>, HandoffError> {
        queries::messages::record_inbound(self.db()?, tenant_id, contact_id, channel, message).await
    }

    async fn insert_message(&self, message: &Message) -> Result<bool, HandoffError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, HandoffError> {
        queries::messages::list_messages(self.db()?, conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists());
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        assert!(storage.get_tenant("t1").await.is_err());
        // Shutdown of a never-opened store is a no-op.
        assert!(storage.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn health_check_and_close_after_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn full_thread_lifecycle_through_trait() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        storage
            .upsert_tenant(&Tenant {
                id: "t1".into(),
                name: "Acme".into(),
                support_email: None,
                business_hours: None,
                knowledge_base: None,
            })
            .await
            .unwrap();
        let contact = storage
            .find_or_create_contact(&NewContact {
                tenant_id: "t1".into(),
                channel: ChannelKind::Whatsapp,
                external_id: "4915112345678".into(),
                display_name: None,
                username: None,
            })
            .await
            .unwrap();
        let (conv, created) = storage
            .find_or_create_open_conversation("t1", &contact.id, ChannelKind::Whatsapp)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(conv.channel, ChannelKind::Whatsapp);
        let loaded = queries::conversations::get_conversation(storage.db().unwrap(), &conv.id)
            .await
            .unwrap();
        assert!(loaded.is_some());
    }
}
