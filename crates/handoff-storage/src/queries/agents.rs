// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent records and the open-conversation load query.

use handoff_core::HandoffError;
use handoff_core::types::{Agent, AgentLoad};
use rusqlite::params;

use crate::database::Database;
use crate::queries::enum_column;

pub async fn upsert_agent(db: &Database, agent: &Agent) -> Result<(), HandoffError> {
    let agent = agent.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO agents (id, tenant_id, name, email, role, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    tenant_id = excluded.tenant_id,
                    name = excluded.name,
                    email = excluded.email,
                    role = excluded.role,
                    active = excluded.active",
                params![
                    agent.id,
                    agent.tenant_id,
                    agent.name,
                    agent.email,
                    agent.role.to_string(),
                    agent.active,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All agents of a tenant (any role, any state), ordered by id.
pub async fn list_agents(db: &Database, tenant_id: &str) -> Result<Vec<Agent>, HandoffError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, name, email, role, active
                 FROM agents WHERE tenant_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok(Agent {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                    role: enum_column(row, 4)?,
                    active: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Open-conversation count per eligible agent (active, non-admin).
///
/// Agents with no open conversations are included with a count of zero.
pub async fn list_agent_loads(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<AgentLoad>, HandoffError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, COUNT(c.id)
                 FROM agents a
                 LEFT JOIN conversations c
                    ON c.assignee_agent_id = a.id
                   AND c.tenant_id = a.tenant_id
                   AND c.status = 'open'
                 WHERE a.tenant_id = ?1 AND a.role = 'agent' AND a.active = 1
                 GROUP BY a.id
                 ORDER BY a.id ASC",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok(AgentLoad {
                    agent_id: row.get(0)?,
                    open_conversations: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
