// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact find-or-create and metadata merge.

use handoff_core::HandoffError;
use handoff_core::types::{Contact, NewContact, new_id, now_timestamp};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use serde_json::{Map, Value};

use crate::database::Database;
use crate::queries::{enum_column, json_column, to_json_text};

const CONTACT_COLUMNS: &str = "id, tenant_id, channel, external_id, display_name, username, \
                               tags, metadata, created_at, updated_at";

fn row_to_contact(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        channel: enum_column(row, 2)?,
        external_id: row.get(3)?,
        display_name: row.get(4)?,
        username: row.get(5)?,
        tags: json_column(row, 6)?,
        metadata: json_column(row, 7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Returns the contact for `(tenant, channel, external_id)`, inserting it on first sight.
///
/// A single upsert statement, so concurrent first messages from the same
/// chat converge on one row. Non-empty profile fields overwrite stored ones.
pub async fn find_or_create_contact(
    db: &Database,
    contact: &NewContact,
) -> Result<Contact, HandoffError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            let now = now_timestamp();
            let channel = contact.channel.to_string();
            conn.execute(
                "INSERT INTO contacts (id, tenant_id, channel, external_id, display_name, username, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(tenant_id, channel, external_id) DO UPDATE SET
                    display_name = COALESCE(excluded.display_name, contacts.display_name),
                    username = COALESCE(excluded.username, contacts.username),
                    updated_at = excluded.updated_at",
                params![
                    new_id(),
                    contact.tenant_id,
                    channel,
                    contact.external_id,
                    contact.display_name,
                    contact.username,
                    now,
                ],
            )?;
            conn.query_row(
                &format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts
                     WHERE tenant_id = ?1 AND channel = ?2 AND external_id = ?3"
                ),
                params![contact.tenant_id, channel, contact.external_id],
                row_to_contact,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_contact(db: &Database, contact_id: &str) -> Result<Option<Contact>, HandoffError> {
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![contact_id],
                row_to_contact,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Merges `patch` into the contact's metadata and unions `tags` into its tag set.
///
/// Keys in `patch` overwrite stored keys (last write wins); keys not in
/// `patch` are left untouched. Read-modify-write runs inside an IMMEDIATE
/// transaction so a concurrent merge cannot drop keys.
pub async fn merge_contact_metadata(
    db: &Database,
    contact_id: &str,
    patch: Map<String, Value>,
    tags: &[String],
) -> Result<(), HandoffError> {
    let contact_id = contact_id.to_string();
    let tags = tags.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = tx
                .query_row(
                    "SELECT tags, metadata FROM contacts WHERE id = ?1",
                    params![contact_id],
                    |row| {
                        Ok((
                            json_column::<Vec<String>>(row, 0)?,
                            json_column::<Map<String, Value>>(row, 1)?,
                        ))
                    },
                )
                .optional()?;

            let Some((mut stored_tags, mut metadata)) = current else {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            };

            for (key, value) in patch {
                metadata.insert(key, value);
            }
            for tag in tags {
                let tag = tag.trim().to_lowercase();
                if !tag.is_empty() && !stored_tags.contains(&tag) {
                    stored_tags.push(tag);
                }
            }

            tx.execute(
                "UPDATE contacts SET tags = ?2, metadata = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    contact_id,
                    to_json_text(&stored_tags)?,
                    to_json_text(&metadata)?,
                    now_timestamp(),
                ],
            )?;
            tx.commit()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
