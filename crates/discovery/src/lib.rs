//! Agent discovery and delegation for AgentMesh.
//!
//! - [`prober`] fetches capability cards from candidate addresses
//! - [`registry`] keeps the known agents in insertion order
//! - [`router`] scores agents against a task
//! - [`delegator`] sends the task to the chosen agent
//! - [`directory`] ties the above together behind [`AgentDirectory`]

pub mod delegator;
pub mod directory;
pub mod prober;
pub mod registry;
pub mod router;
pub mod tracker;

pub use delegator::{Delegator, TaskEnvelope, UserContext};
pub use directory::{AgentDirectory, DelegationReport, DelegationRequest, NO_SUITABLE_AGENT};
pub use prober::EndpointProber;
pub use registry::CapabilityRegistry;
pub use router::RouteDecision;
pub use tracker::TaskTracker;
