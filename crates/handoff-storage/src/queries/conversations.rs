// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation thread operations.

use handoff_core::HandoffError;
use handoff_core::types::{ChannelKind, Conversation, new_id, now_timestamp};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::database::Database;
use crate::queries::enum_column;

const CONVERSATION_COLUMNS: &str = "id, tenant_id, contact_id, channel, assignee_agent_id, status, \
                                    unread_count, last_message_at, summary, created_at, updated_at";

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        contact_id: row.get(2)?,
        channel: enum_column(row, 3)?,
        assignee_agent_id: row.get(4)?,
        status: enum_column(row, 5)?,
        unread_count: row.get(6)?,
        last_message_at: row.get(7)?,
        summary: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Inserts an open conversation unless one exists, then reads the open one.
///
/// The insert is `INSERT OR IGNORE` against the partial unique index on open
/// conversations, so when several writers (threads or processes) race only
/// one row is created. The flag is `true` for the writer whose insert won.
/// Pending and closed conversations are never reopened.
pub(crate) fn open_conversation(
    conn: &Connection,
    tenant_id: &str,
    contact_id: &str,
    channel: ChannelKind,
) -> rusqlite::Result<(Conversation, bool)> {
    let now = now_timestamp();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO conversations
            (id, tenant_id, contact_id, channel, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'open', ?5, ?5)",
        params![new_id(), tenant_id, contact_id, channel.to_string(), now],
    )?;
    let conversation = conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE tenant_id = ?1 AND contact_id = ?2 AND status = 'open'"
        ),
        params![tenant_id, contact_id],
        row_to_conversation,
    )?;
    Ok((conversation, inserted == 1))
}

pub(crate) fn conversation_by_id(
    conn: &Connection,
    conversation_id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![conversation_id],
        row_to_conversation,
    )
    .optional()
}

/// Returns the open conversation for `(tenant, contact)`, creating it if none exists.
pub async fn find_or_create_open_conversation(
    db: &Database,
    tenant_id: &str,
    contact_id: &str,
    channel: ChannelKind,
) -> Result<(Conversation, bool), HandoffError> {
    let tenant_id = tenant_id.to_string();
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let opened = open_conversation(&tx, &tenant_id, &contact_id, channel)?;
            tx.commit()?;
            Ok(opened)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(any(test, feature = "test-support"))]
pub async fn get_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<Conversation>, HandoffError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| conversation_by_id(conn, &conversation_id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bumps `last_message_at` and optionally the unread counter.
pub async fn touch_conversation(
    db: &Database,
    conversation_id: &str,
    increment_unread: bool,
) -> Result<(), HandoffError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations
                 SET last_message_at = ?2, updated_at = ?2, unread_count = unread_count + ?3
                 WHERE id = ?1",
                params![conversation_id, now_timestamp(), i64::from(increment_unread)],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compare-and-set assignment: succeeds only if the conversation is still
/// open and unassigned.
pub async fn assign_conversation(
    db: &Database,
    conversation_id: &str,
    agent_id: &str,
) -> Result<bool, HandoffError> {
    let conversation_id = conversation_id.to_string();
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET assignee_agent_id = ?2, updated_at = ?3
                 WHERE id = ?1 AND assignee_agent_id IS NULL AND status = 'open'",
                params![conversation_id, agent_id, now_timestamp()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_conversation_summary(
    db: &Database,
    conversation_id: &str,
    summary: &str,
) -> Result<(), HandoffError> {
    let conversation_id = conversation_id.to_string();
    let summary = summary.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET summary = ?2, updated_at = ?3 WHERE id = ?1",
                params![conversation_id, summary, now_timestamp()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Changes a conversation's status. The routing engine itself never closes
/// or parks conversations.
#[cfg(any(test, feature = "test-support"))]
pub async fn set_conversation_status(
    db: &Database,
    conversation_id: &str,
    status: handoff_core::types::ConversationStatus,
) -> Result<(), HandoffError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![conversation_id, status.to_string(), now_timestamp()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of open conversations for a contact. Should never exceed one.
#[cfg(any(test, feature = "test-support"))]
pub async fn count_open_conversations(
    db: &Database,
    tenant_id: &str,
    contact_id: &str,
) -> Result<i64, HandoffError> {
    let tenant_id = tenant_id.to_string();
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM conversations
                 WHERE tenant_id = ?1 AND contact_id = ?2 AND status = 'open'",
                params![tenant_id, contact_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
