//! Message coordination for AgentMesh.
//!
//! Ties the agent directory, session manager, and context store together:
//! a user message picks up its session and archived history, is routed and
//! delegated, and the exchange is charged to the session budget and archived.

pub mod coordinator;
pub mod response;

pub use coordinator::{Coordinator, MessageOutcome, MessageRequest, RetrievalLimits};
pub use response::response_text;
