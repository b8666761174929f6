// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Least-loaded agent selection.

use std::collections::HashMap;
use std::sync::Arc;

use handoff_core::error::HandoffError;
use handoff_core::traits::storage::StorageAdapter;
use handoff_core::types::{Agent, AgentLoad, AgentRole};
use tracing::debug;

/// Whether an agent may receive conversations.
pub fn is_eligible(agent: &Agent) -> bool {
    agent.active && agent.role == AgentRole::Agent
}

/// Picks the eligible agent with the fewest open conversations, lowest id first on ties.
///
/// Agents missing from `loads` count as idle, so an empty load list degrades
/// to "lowest eligible id".
pub fn select_least_loaded(agents: &[Agent], loads: &[AgentLoad]) -> Option<String> {
    let load_by_agent: HashMap<&str, u32> = loads
        .iter()
        .map(|l| (l.agent_id.as_str(), l.open_conversations))
        .collect();

    agents
        .iter()
        .filter(|a| is_eligible(a))
        .min_by_key(|a| {
            (
                load_by_agent.get(a.id.as_str()).copied().unwrap_or(0),
                a.id.as_str(),
            )
        })
        .map(|a| a.id.clone())
}

/// Storage-backed balancer.
#[derive(Clone)]
pub struct AssignmentBalancer {
    storage: Arc<dyn StorageAdapter>,
}

impl AssignmentBalancer {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Returns `None` only when the tenant has no eligible agent.
    pub async fn pick_agent(&self, tenant_id: &str) -> Result<Option<String>, HandoffError> {
        let agents = self.storage.list_agents(tenant_id).await?;
        let loads = self.storage.list_agent_loads(tenant_id).await?;
        let picked = select_least_loaded(&agents, &loads);
        debug!(
            tenant_id,
            candidates = agents.iter().filter(|a| is_eligible(a)).count(),
            picked = picked.as_deref().unwrap_or("none"),
            "agent selection"
        );
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn agent(id: &str, role: AgentRole, active: bool) -> Agent {
        Agent {
            id: id.into(),
            tenant_id: "t1".into(),
            name: id.to_uppercase(),
            email: None,
            role,
            active,
        }
    }

    fn load(id: &str, open: u32) -> AgentLoad {
        AgentLoad {
            agent_id: id.into(),
            open_conversations: open,
        }
    }

    #[test]
    fn fewest_open_conversations_wins() {
        let agents = [
            agent("a", AgentRole::Agent, true),
            agent("b", AgentRole::Agent, true),
        ];
        let loads = [load("a", 2), load("b", 0)];
        assert_eq!(select_least_loaded(&agents, &loads).as_deref(), Some("b"));
    }

    #[test]
    fn ties_go_to_lowest_id() {
        let agents = [
            agent("zoe", AgentRole::Agent, true),
            agent("amy", AgentRole::Agent, true),
        ];
        let loads = [load("zoe", 1), load("amy", 1)];
        assert_eq!(select_least_loaded(&agents, &loads).as_deref(), Some("amy"));
    }

    #[test]
    fn admins_and_inactive_agents_are_skipped() {
        let agents = [
            agent("a", AgentRole::Admin, true),
            agent("b", AgentRole::Agent, false),
            agent("c", AgentRole::Agent, true),
        ];
        let loads = [load("a", 0), load("b", 0), load("c", 9)];
        assert_eq!(select_least_loaded(&agents, &loads).as_deref(), Some("c"));
    }

    #[test]
    fn missing_load_data_falls_back_to_lowest_id() {
        let agents = [
            agent("m", AgentRole::Agent, true),
            agent("k", AgentRole::Agent, true),
        ];
        assert_eq!(select_least_loaded(&agents, &[]).as_deref(), Some("k"));
    }

    #[test]
    fn no_eligible_agent_yields_none() {
        let agents = [agent("a", AgentRole::Admin, true)];
        assert_eq!(select_least_loaded(&agents, &[]), None);
        assert_eq!(select_least_loaded(&[], &[]), None);
    }

    fn arb_agents() -> impl Strategy<Value = Vec<(Agent, u32)>> {
        prop::collection::vec((any::<bool>(), any::<bool>(), 0u32..5), 0..8).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (is_agent, active, open))| {
                    let role = if is_agent { AgentRole::Agent } else { AgentRole::Admin };
                    (agent(&format!("agent-{i}"), role, active), open)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn selection_is_eligible_and_minimal(roster in arb_agents()) {
            let agents: Vec<Agent> = roster.iter().map(|(a, _)| a.clone()).collect();
            let loads: Vec<AgentLoad> = roster.iter().map(|(a, n)| load(&a.id, *n)).collect();
            let eligible: Vec<&(Agent, u32)> = roster.iter().filter(|(a, _)| is_eligible(a)).collect();

            match select_least_loaded(&agents, &loads) {
                None => prop_assert!(eligible.is_empty()),
                Some(id) => {
                    let (chosen, chosen_load) = roster.iter().find(|(a, _)| a.id == id).unwrap();
                    prop_assert!(is_eligible(chosen));
                    for (other, other_load) in &eligible {
                        prop_assert!(
                            (*chosen_load, chosen.id.as_str()) <= (*other_load, other.id.as_str())
                        );
                    }
                }
            }
        }
    }
}
