use std::collections::HashMap;
use taskforce_core::{AgentSpec, TeamSpec};
use uuid::Uuid;

/// Read-only agent lookup for one team run.
///
/// Built once from [`TeamSpec::agents`]; pure lookup, no behavior.
pub struct AgentRegistry {
    agents: HashMap<Uuid, AgentSpec>,
}

impl AgentRegistry {
    /// Build the registry from a team definition.
    pub fn from_team(team: &TeamSpec) -> Self {
        let agents = team.agents.iter().map(|a| (a.id, a.clone())).collect();
        Self { agents }
    }

    /// Look up an agent by id.
    pub fn get(&self, agent_id: Uuid) -> Option<&AgentSpec> {
        self.agents.get(&agent_id)
    }

    /// Whether the registry knows this agent.
    pub fn contains(&self, agent_id: Uuid) -> bool {
        self.agents.contains_key(&agent_id)
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
