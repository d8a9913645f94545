//! `agentmesh serve`: start the HTTP gateway.

use super::{CmdResult, load_config};
use std::path::Path;

pub async fn run(explicit: Option<&Path>, port_override: Option<u16>) -> CmdResult {
    let mut config = load_config(explicit).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🕸️  AgentMesh Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Endpoints: {}", config.discovery.endpoints.join(", "));

    agentmesh_gateway::start(config).await?;

    Ok(())
}
