//! `agentmesh init`: write a default configuration.

use super::{CmdResult, config_path};
use agentmesh_config::AppConfig;
use std::path::Path;

pub fn run(explicit: Option<&Path>, force: bool) -> CmdResult {
    let path = config_path(explicit);

    println!("🕸️  AgentMesh Setup");
    println!("==================\n");

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if path.exists() && !force {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.");
        return Ok(());
    }

    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Wrote config to: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. List your agents under [discovery] endpoints");
    println!("   2. Run `agentmesh doctor` to check they answer");
    println!("   3. Run `agentmesh serve` to start the gateway");

    Ok(())
}
