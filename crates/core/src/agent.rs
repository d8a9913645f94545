//! Remote agents and the capability descriptors they publish.
//!
//! An agent publishes an [`AgentCard`] at a well-known path. The card is the
//! loosely-populated wire form; [`AgentCard::into_agent_info`] applies the
//! defaulting rules and yields the [`AgentInfo`] the registry stores.

use serde::{Deserialize, Serialize};

/// Version assumed when a card omits one.
pub const DEFAULT_AGENT_VERSION: &str = "1.0.0";

/// A skill as it appears on the wire. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillCard {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// The capability descriptor served at `/.well-known/agent-card.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCard {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub skills: Vec<SkillCard>,
}

fn default_version() -> String {
    DEFAULT_AGENT_VERSION.into()
}

impl AgentCard {
    /// Resolve the card against the address it was probed from.
    ///
    /// A missing `name` becomes `agent_<host>_<port>` and a missing `url`
    /// becomes the probed address itself.
    pub fn into_agent_info(self, probed_address: &str) -> AgentInfo {
        let base = probed_address.trim_end_matches('/');
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback_name(base));
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| base.to_string());

        AgentInfo {
            name,
            description: self.description,
            url,
            version: self.version,
            skills: self.skills.into_iter().map(Skill::from).collect(),
        }
    }
}

/// Derive an agent name from an address such as `http://localhost:9998`.
fn fallback_name(address: &str) -> String {
    let authority = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address)
        .split('/')
        .next()
        .unwrap_or_default();
    format!("agent_{}", authority.replace([':', '.'], "_"))
}

/// A tag-indexed capability of an agent, used for routing decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
}

impl From<SkillCard> for Skill {
    fn from(card: SkillCard) -> Self {
        Self {
            id: card.id,
            name: card.name,
            description: card.description,
            tags: card.tags,
            examples: card.examples,
        }
    }
}

impl Skill {
    /// Whether any non-empty tag is a case-insensitive substring of `text_lower`.
    ///
    /// `text_lower` must already be lowercased.
    pub fn tags_match(&self, text_lower: &str) -> bool {
        self.tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .any(|t| !t.is_empty() && text_lower.contains(&t))
    }

    /// The identifier sent to the agent: `id`, else `name`, else `"default"`.
    pub fn call_id(&self) -> &str {
        if !self.id.is_empty() {
            &self.id
        } else if !self.name.is_empty() {
            &self.name
        } else {
            "default"
        }
    }

    /// Display name: `name`, else `id`, else `"unknown"`.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.id.is_empty() {
            &self.id
        } else {
            "unknown"
        }
    }
}

/// A discovered agent. Keyed by `name` in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub skills: Vec<Skill>,
}

impl AgentInfo {
    /// Find a skill by case-insensitive name or id.
    pub fn find_skill(&self, name_or_id: &str) -> Option<&Skill> {
        let wanted = name_or_id.to_lowercase();
        self.skills
            .iter()
            .find(|s| s.name.to_lowercase() == wanted || s.id.to_lowercase() == wanted)
    }
}
