//! `localecho gateway` — Start the HTTP API server.

use std::path::Path;

use anyhow::Context;
use localecho_gateway::Runtime;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🔊 localecho Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Session:   {}", config.session_id);

    let runtime = Runtime::from_config(config)
        .await
        .context("Failed to start localecho")?;
    localecho_gateway::start(runtime)
        .await
        .context("Gateway stopped with an error")?;

    Ok(())
}
