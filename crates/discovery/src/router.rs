//! Task router: picks the agent whose capabilities best fit a task.
//!
//! Scoring per agent, summed over its skills:
//! - +3 if any skill tag is a case-insensitive substring of the task
//! - +2 if any token of the skill name is a task token
//! - +1 if any token of the skill description is a task token
//!
//! plus +1 if any token of the agent description is a task token. The
//! strictly highest score wins, so ties go to the earlier agent.

use agentmesh_core::{AgentInfo, Skill};
use std::collections::HashSet;

/// Tag match weight.
pub const TAG_WEIGHT: u32 = 3;
/// Skill-name token weight.
pub const NAME_WEIGHT: u32 = 2;
/// Description token weight (skill or agent).
pub const DESCRIPTION_WEIGHT: u32 = 1;

/// Outcome of routing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Matched {
        agent: AgentInfo,
        /// `None` when the agent publishes no skills.
        skill: Option<Skill>,
        score: u32,
    },
    NoMatch,
}

impl RouteDecision {
    pub fn agent(&self) -> Option<&AgentInfo> {
        match self {
            Self::Matched { agent, .. } => Some(agent),
            Self::NoMatch => None,
        }
    }

    pub fn score(&self) -> u32 {
        match self {
            Self::Matched { score, .. } => *score,
            Self::NoMatch => 0,
        }
    }
}

/// Lowercase, split on whitespace, trim non-alphanumeric edges, drop empties.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn any_token_in(text: &str, task_tokens: &HashSet<String>) -> bool {
    tokenize(text).iter().any(|t| task_tokens.contains(t))
}

/// Score one agent against a task.
pub fn score(agent: &AgentInfo, task: &str) -> u32 {
    let task_lower = task.to_lowercase();
    let task_tokens = tokenize(task);

    let mut total = 0;
    for skill in &agent.skills {
        if skill.tags_match(&task_lower) {
            total += TAG_WEIGHT;
        }
        if any_token_in(&skill.name, &task_tokens) {
            total += NAME_WEIGHT;
        }
        if any_token_in(&skill.description, &task_tokens) {
            total += DESCRIPTION_WEIGHT;
        }
    }
    if any_token_in(&agent.description, &task_tokens) {
        total += DESCRIPTION_WEIGHT;
    }
    total
}

/// The first skill whose tags match the task, else the agent's first skill.
pub fn select_skill<'a>(agent: &'a AgentInfo, task: &str) -> Option<&'a Skill> {
    let task_lower = task.to_lowercase();
    agent
        .skills
        .iter()
        .find(|s| s.tags_match(&task_lower))
        .or_else(|| agent.skills.first())
}

/// Route a task over a set of agents, in registry order.
pub fn route(agents: &[AgentInfo], task: &str) -> RouteDecision {
    let mut best: Option<(&AgentInfo, u32)> = None;
    for agent in agents {
        let s = score(agent, task);
        tracing::debug!(agent = %agent.name, score = s, "Scored agent");
        if s > best.map_or(0, |(_, b)| b) {
            best = Some((agent, s));
        }
    }

    match best {
        Some((agent, score)) => RouteDecision::Matched {
            skill: select_skill(agent, task).cloned(),
            agent: agent.clone(),
            score,
        },
        None => RouteDecision::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(id: &str, name: &str, description: &str, tags: &[&str]) -> Skill {
        Skill {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            examples: vec![],
        }
    }

    fn agent(name: &str, description: &str, skills: Vec<Skill>) -> AgentInfo {
        AgentInfo {
            name: name.into(),
            description: description.into(),
            url: format!("http://{name}"),
            version: "1.0.0".into(),
            skills,
        }
    }

    #[test]
    fn tokenize_trims_punctuation() {
        let tokens = tokenize("  Attack, the GOBLIN!  --  ");
        assert!(tokens.contains("attack"));
        assert!(tokens.contains("goblin"));
        assert!(!tokens.contains("--"));
        assert!(!tokens.contains(""));
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn score_weights() {
        let a = agent(
            "combat",
            "fights",
            vec![skill("atk", "Attack Roll", "roll to hit", &["combat"])],
        );
        // tag "combat" (+3), name token "attack" (+2), description token "roll" (+1)
        assert_eq!(score(&a, "combat: attack roll"), 6);
        // agent description "fights" (+1)
        assert_eq!(score(&a, "who fights"), 1);
        assert_eq!(score(&a, "bake bread"), 0);
    }

    #[test]
    fn tag_match_beats_no_tag() {
        let lore = agent("lore", "", vec![skill("q", "Query", "", &["lore"])]);
        let items = agent("items", "", vec![skill("c", "Create", "", &["inventory"])]);
        let agents = vec![lore, items];

        let decision = route(&agents, "check my inventory");
        assert_eq!(decision.agent().unwrap().name, "items");
    }

    #[test]
    fn ties_go_to_first_registered() {
        let a = agent("first", "", vec![skill("x", "", "", &["dragon"])]);
        let b = agent("second", "", vec![skill("y", "", "", &["dragon"])]);
        let agents = vec![a, b];

        let decision = route(&agents, "tell me about the dragon");
        assert_eq!(decision.agent().unwrap().name, "first");
        assert_eq!(decision.score(), 3);
    }

    #[test]
    fn all_zero_is_no_match() {
        let a = agent("a", "", vec![skill("x", "Heal", "", &["heal"])]);
        assert_eq!(route(&[a], "bake bread"), RouteDecision::NoMatch);
        assert_eq!(route(&[], "anything"), RouteDecision::NoMatch);
    }

    #[test]
    fn empty_tags_never_match() {
        let a = agent("a", "", vec![skill("x", "", "", &["", "  "])]);
        assert_eq!(score(&a, "any task at all"), 0);
    }

    #[test]
    fn select_skill_prefers_tag_match() {
        let a = agent(
            "a",
            "",
            vec![
                skill("one", "One", "", &["lore"]),
                skill("two", "Two", "", &["combat"]),
            ],
        );
        assert_eq!(select_skill(&a, "start combat").unwrap().id, "two");
        assert_eq!(select_skill(&a, "something else").unwrap().id, "one");
    }

    #[test]
    fn agent_without_skills_matches_without_skill() {
        let a = agent("bare", "dragon expert", vec![]);
        match route(&[a], "dragon") {
            RouteDecision::Matched { skill, score, .. } => {
                assert!(skill.is_none());
                assert_eq!(score, 1);
            }
            RouteDecision::NoMatch => panic!("expected a match"),
        }
    }
}
