pub mod agent;
pub mod archives;
pub mod gateway;
pub mod models;
pub mod notes;
pub mod onboard;
pub mod status;
pub mod tasks;

use std::path::Path;

use anyhow::Context;
use localecho_config::AppConfig;
use localecho_gateway::Runtime;

/// The config at `path`, or the default location, with env overrides applied.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate().context("Invalid configuration")?;
            Ok(config)
        }
        None => AppConfig::load().context("Failed to load config"),
    }
}

pub async fn runtime(path: Option<&Path>) -> anyhow::Result<Runtime> {
    let config = load_config(path)?;
    Runtime::from_config(config)
        .await
        .context("Failed to start localecho")
}
