pub mod agents;
pub mod context;
pub mod doctor;
pub mod init;
pub mod serve;

use agentmesh_config::AppConfig;
use std::path::{Path, PathBuf};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// The config file a command reads: `--config` or the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load config from `--config` or the default location, with env overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match explicit {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}
