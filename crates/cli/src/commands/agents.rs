//! `agentmesh discover | route | delegate | call`: agent directory commands.

use super::{CmdResult, load_config};
use agentmesh_discovery::{AgentDirectory, DelegationReport, RouteDecision};
use std::path::Path;

fn directory(explicit: Option<&Path>) -> Result<AgentDirectory, Box<dyn std::error::Error>> {
    let config = load_config(explicit).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(AgentDirectory::from_config(&config)?)
}

fn print_report(report: &DelegationReport) -> CmdResult {
    if report.success {
        println!(
            "✅ Delegated to {} ({})",
            report.delegated_to.as_deref().unwrap_or("?"),
            report.skill_used.as_deref().unwrap_or("?")
        );
    } else {
        println!("❌ {}", report.error.as_deref().unwrap_or("Delegation failed"));
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

pub async fn discover(explicit: Option<&Path>) -> CmdResult {
    let directory = directory(explicit)?;

    println!("🔎 Probing {} endpoint(s)...\n", directory.prober().endpoints().len());
    let found = directory.discover().await;
    if found.is_empty() {
        println!("   No agents answered.");
        return Ok(());
    }

    println!("{}", directory.capabilities_summary().await);
    Ok(())
}

pub async fn route(explicit: Option<&Path>, task: &str) -> CmdResult {
    let directory = directory(explicit)?;

    match directory.route(task).await {
        RouteDecision::Matched { agent, skill, score } => {
            println!("🎯 {} (score {score})", agent.name);
            match skill {
                Some(skill) => println!("   Skill: {}", skill.display_name()),
                None => println!("   Agent advertises no skills"),
            }
        }
        RouteDecision::NoMatch => {
            println!("🤷 No suitable agent found for this task\n");
            println!("{}", directory.capabilities_summary().await);
        }
    }
    Ok(())
}

pub async fn delegate(
    explicit: Option<&Path>,
    task: &str,
    user: &str,
    server: Option<&str>,
    context: Option<&str>,
) -> CmdResult {
    let directory = directory(explicit)?;
    let report = directory
        .delegate_task(task, user, server, context.unwrap_or_default())
        .await;
    print_report(&report)
}

pub async fn call(
    explicit: Option<&Path>,
    agent: &str,
    skill: &str,
    task: &str,
    user: &str,
    server: Option<&str>,
) -> CmdResult {
    let directory = directory(explicit)?;
    let report = directory
        .call_specific_agent(agent, skill, user, server, task)
        .await;
    print_report(&report)
}
