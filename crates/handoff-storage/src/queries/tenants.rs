// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant and channel credential operations.

use handoff_core::HandoffError;
use handoff_core::types::{BusinessHours, ChannelCredential, ChannelKind, Tenant, now_timestamp};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::queries::{enum_column, to_json_text};

/// Insert or replace a tenant's profile.
pub async fn upsert_tenant(db: &Database, tenant: &Tenant) -> Result<(), HandoffError> {
    let tenant = tenant.clone();
    db.connection()
        .call(move |conn| {
            let hours = tenant
                .business_hours
                .as_ref()
                .map(to_json_text)
                .transpose()?;
            conn.execute(
                "INSERT INTO tenants (id, name, support_email, business_hours, knowledge_base, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    support_email = excluded.support_email,
                    business_hours = excluded.business_hours,
                    knowledge_base = excluded.knowledge_base,
                    updated_at = excluded.updated_at",
                params![
                    tenant.id,
                    tenant.name,
                    tenant.support_email,
                    hours,
                    tenant.knowledge_base,
                    now_timestamp(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_tenant(db: &Database, tenant_id: &str) -> Result<Option<Tenant>, HandoffError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, support_email, business_hours, knowledge_base
                 FROM tenants WHERE id = ?1",
                params![tenant_id],
                |row| {
                    let hours: Option<String> = row.get(3)?;
                    let business_hours = hours
                        .map(|raw| serde_json::from_str::<BusinessHours>(&raw))
                        .transpose()
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                3,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?;
                    Ok(Tenant {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        support_email: row.get(2)?,
                        business_hours,
                        knowledge_base: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn upsert_channel_credential(
    db: &Database,
    credential: &ChannelCredential,
) -> Result<(), HandoffError> {
    let credential = credential.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channel_credentials (tenant_id, channel, token, webhook_secret, account_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(tenant_id, channel) DO UPDATE SET
                    token = excluded.token,
                    webhook_secret = excluded.webhook_secret,
                    account_id = excluded.account_id",
                params![
                    credential.tenant_id,
                    credential.channel.to_string(),
                    credential.token,
                    credential.webhook_secret,
                    credential.account_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_channel_credential(
    db: &Database,
    tenant_id: &str,
    channel: ChannelKind,
) -> Result<Option<ChannelCredential>, HandoffError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT tenant_id, channel, token, webhook_secret, account_id
                 FROM channel_credentials WHERE tenant_id = ?1 AND channel = ?2",
                params![tenant_id, channel.to_string()],
                |row| {
                    Ok(ChannelCredential {
                        tenant_id: row.get(0)?,
                        channel: enum_column(row, 1)?,
                        token: row.get(2)?,
                        webhook_secret: row.get(3)?,
                        account_id: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
