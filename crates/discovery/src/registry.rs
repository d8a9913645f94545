//! Capability registry: the set of known agents, keyed by name.
//!
//! Insertion order is preserved so routing ties resolve deterministically
//! to the agent that was registered first.

use agentmesh_core::AgentInfo;
use std::fmt::Write;
use tracing::debug;

/// Known agents in insertion order.
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    agents: Vec<AgentInfo>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an agent by name. A replaced agent keeps its position.
    ///
    /// Returns `true` if the agent was not known before.
    pub fn upsert(&mut self, agent: AgentInfo) -> bool {
        match self.agents.iter_mut().find(|a| a.name == agent.name) {
            Some(existing) => {
                debug!(agent = %agent.name, "Replacing registry entry");
                *existing = agent;
                false
            }
            None => {
                debug!(agent = %agent.name, "Registering agent");
                self.agents.push(agent);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&AgentInfo> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// All agents in insertion order.
    pub fn list(&self) -> &[AgentInfo] {
        &self.agents
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Human-readable listing of agents and their skills.
    pub fn capabilities_summary(&self) -> String {
        if self.agents.is_empty() {
            return "No agents currently discovered.".into();
        }

        let mut summary = String::from("Available agents:\n");
        for agent in &self.agents {
            let _ = write!(summary, "\n• {}: {}\n", agent.name, agent.description);
            if !agent.skills.is_empty() {
                summary.push_str("  Skills:\n");
                for skill in &agent.skills {
                    let _ = writeln!(summary, "    - {}: {}", skill.display_name(), skill.description);
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_core::Skill;

    fn agent(name: &str, description: &str) -> AgentInfo {
        AgentInfo {
            name: name.into(),
            description: description.into(),
            url: format!("http://{name}"),
            version: "1.0.0".into(),
            skills: vec![],
        }
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut registry = CapabilityRegistry::new();
        assert!(registry.upsert(agent("a", "first")));
        assert!(registry.upsert(agent("b", "second")));
        assert!(!registry.upsert(agent("a", "updated")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().description, "updated");
    }

    #[test]
    fn empty_summary() {
        assert_eq!(
            CapabilityRegistry::new().capabilities_summary(),
            "No agents currently discovered."
        );
    }

    #[test]
    fn summary_lists_skills() {
        let mut registry = CapabilityRegistry::new();
        let mut lore = agent("lore_agent", "World lore");
        lore.skills.push(Skill {
            id: "lookup".into(),
            name: "Lore Lookup".into(),
            description: "Answer lore questions".into(),
            tags: vec!["lore".into()],
            examples: vec![],
        });
        registry.upsert(lore);

        let summary = registry.capabilities_summary();
        assert!(summary.contains("• lore_agent: World lore"));
        assert!(summary.contains("- Lore Lookup: Answer lore questions"));
    }
}
