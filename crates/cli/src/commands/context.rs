//! `agentmesh context`: archived context inspection and pruning.

use super::{CmdResult, load_config};
use agentmesh_memory::ContextStore;
use std::path::Path;

pub async fn stats(explicit: Option<&Path>, user: &str) -> CmdResult {
    let config = load_config(explicit).map_err(|e| format!("Failed to load config: {e}"))?;
    let store = ContextStore::from_config(&config.context).await?;

    let stats = store.user_stats(user).await?;
    println!("🧠 Context for {user}");
    println!("====================");
    println!("  Backend:   {} ({})", store.backend_name(), store.strategy().label());
    println!("  Chunks:    {}", stats.chunk_count);
    println!("  Tokens:    {}", stats.total_tokens);
    if let (Some(first), Some(last)) = (stats.first_conversation, stats.last_conversation) {
        println!("  First:     {}", first.to_rfc3339());
        println!("  Last:      {}", last.to_rfc3339());
    }

    let persona = store.get_persona_context(user).await;
    if !persona.is_empty() {
        println!("\n  Persona:   {persona}");
    }
    Ok(())
}

pub async fn search(
    explicit: Option<&Path>,
    user: &str,
    query: &str,
    max_chunks: Option<usize>,
    max_tokens: Option<usize>,
) -> CmdResult {
    let config = load_config(explicit).map_err(|e| format!("Failed to load config: {e}"))?;
    let store = ContextStore::from_config(&config.context).await?;

    let context = store
        .retrieve(
            user,
            query,
            max_chunks.unwrap_or(config.context.max_chunks),
            max_tokens.unwrap_or(config.context.max_tokens),
        )
        .await;

    println!("🔍 Context for \"{query}\"\n");
    if context.is_empty() {
        println!("   Nothing archived for {user}.");
    } else {
        println!("{context}");
    }
    Ok(())
}

pub async fn cleanup(explicit: Option<&Path>, days: Option<u32>) -> CmdResult {
    let config = load_config(explicit).map_err(|e| format!("Failed to load config: {e}"))?;
    let store = ContextStore::from_config(&config.context).await?;

    let days = days.unwrap_or(config.context.retention_days);
    let removed = store.cleanup(days).await?;
    println!("🗑️  Removed {removed} chunk(s) older than {days} day(s).");
    Ok(())
}
