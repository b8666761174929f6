// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log.

use handoff_core::HandoffError;
use handoff_core::types::{ChannelKind, Message, NormalizedMessage, RecordedInbound};
use rusqlite::{Connection, TransactionBehavior, params};

use crate::database::Database;
use crate::queries::conversations::{conversation_by_id, open_conversation};
use crate::queries::enum_column;

/// Appends `msg` unless its dedupe key is taken. Returns the row count.
fn insert_row(conn: &Connection, msg: &Message) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO messages (id, tenant_id, conversation_id, direction, sender_role,
            content_type, body, media_ref, platform_message_id, dedupe_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(tenant_id, dedupe_key) WHERE dedupe_key IS NOT NULL DO NOTHING",
        params![
            msg.id,
            msg.tenant_id,
            msg.conversation_id,
            msg.direction.to_string(),
            msg.sender_role.to_string(),
            msg.content_type.to_string(),
            msg.body,
            msg.media_ref,
            msg.platform_message_id,
            msg.dedupe_key,
            msg.created_at,
        ],
    )
}

/// Appends a message.
///
/// Returns `false` without writing when the tenant already has a message
/// with the same dedupe key, which makes webhook redelivery a no-op.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<bool, HandoffError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| Ok(insert_row(conn, &msg)? == 1))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Stores an inbound message and the thread it opens, atomically.
///
/// Runs under an immediate transaction, which holds SQLite's write lock from
/// the dedupe check to the commit. A replay therefore never opens a
/// conversation, and of several first messages racing for a new contact
/// exactly one comes back with `opened = true`.
pub async fn record_inbound(
    db: &Database,
    tenant_id: &str,
    contact_id: &str,
    channel: ChannelKind,
    message: &NormalizedMessage,
) -> Result<Option<RecordedInbound>, HandoffError> {
    let tenant_id = tenant_id.to_string();
    let contact_id = contact_id.to_string();
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let seen: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE tenant_id = ?1 AND dedupe_key = ?2)",
                params![tenant_id, message.dedupe_key(channel)],
                |row| row.get(0),
            )?;
            if seen {
                return Ok(None);
            }

            let (conversation, opened) = open_conversation(&tx, &tenant_id, &contact_id, channel)?;
            let row = Message::inbound(&tenant_id, &conversation.id, channel, &message);
            if insert_row(&tx, &row)? == 0 {
                return Ok(None);
            }
            tx.execute(
                "UPDATE conversations
                 SET last_message_at = ?2, updated_at = ?2, unread_count = unread_count + 1
                 WHERE id = ?1",
                params![conversation.id, row.created_at],
            )?;
            let conversation = conversation_by_id(&tx, &conversation.id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;

            Ok(Some(RecordedInbound {
                conversation,
                opened,
                message: row,
            }))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages of a conversation in chronological order.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, HandoffError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, conversation_id, direction, sender_role, content_type,
                        body, media_ref, platform_message_id, dedupe_key, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    conversation_id: row.get(2)?,
                    direction: enum_column(row, 3)?,
                    sender_role: enum_column(row, 4)?,
                    content_type: enum_column(row, 5)?,
                    body: row.get(6)?,
                    media_ref: row.get(7)?,
                    platform_message_id: row.get(8)?,
                    dedupe_key: row.get(9)?,
                    created_at: row.get(10)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
