//! # AgentMesh Core
//!
//! Domain types, error definitions, and text heuristics shared by every
//! AgentMesh crate. This crate performs **no I/O**; it defines the model
//! that discovery, the context store, and the session manager implement
//! against.
//!
//! ## Contents
//!
//! - [`agent`]: discovered agents, their skills, and the wire-level card
//! - [`session`]: per-user session records
//! - [`chunk`]: archived conversation chunks
//! - [`persona`]: persona lexicon and extraction
//! - [`token`]: token estimation

pub mod agent;
pub mod chunk;
pub mod error;
pub mod persona;
pub mod session;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentCard, AgentInfo, Skill, SkillCard};
pub use chunk::{ContextStats, ConversationChunk};
pub use error::{DelegationError, DiscoveryError, Error, Result, SessionError, StoreError};
pub use persona::extract_persona;
pub use session::{SessionInfo, SessionStats};
pub use token::{HeuristicCounter, TokenCounter, estimate_tokens};
