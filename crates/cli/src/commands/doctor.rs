//! `agentmesh doctor`: diagnose configuration and agent reachability.

use super::{CmdResult, config_path, load_config};
use agentmesh_discovery::EndpointProber;
use agentmesh_memory::ContextStore;
use std::path::Path;

pub async fn run(explicit: Option<&Path>) -> CmdResult {
    println!("🩺 AgentMesh Doctor");
    println!("===================\n");

    let mut issues = 0;

    let path = config_path(explicit);
    if !path.exists() {
        println!("  ⚠️  No config file at {}; using defaults", path.display());
        issues += 1;
    }

    let config = match load_config(explicit) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    let prober = EndpointProber::from_config(&config.discovery)?;
    for endpoint in prober.endpoints() {
        match prober.probe(endpoint).await {
            Ok(agent) => println!("  ✅ {endpoint}: {} ({} skills)", agent.name, agent.skills.len()),
            Err(e) => {
                println!("  ❌ {endpoint}: {e}");
                issues += 1;
            }
        }
    }

    match ContextStore::from_config(&config.context).await {
        Ok(store) => match store.count().await {
            Ok(count) => println!(
                "  ✅ Context store ({}, {} ranking): {count} chunk(s)",
                store.backend_name(),
                store.strategy().label()
            ),
            Err(e) => {
                println!("  ❌ Context store unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Context store unavailable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
