//! `localecho status` — Show configuration and model state.

use std::path::Path;

use localecho_core::lifecycle::ModelLifecycle;
use localecho_core::store::{NoteStore, TaskStatus, TaskStore};

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let runtime = super::runtime(config_path).await?;
    let config = &runtime.config;

    println!("🔊 localecho Status");
    println!("===================");
    println!("  Config dir:   {}", config.base_dir().display());
    println!("  Session:      {}", config.session_id);
    println!("  Inference:    {}", config.inference.base_url);
    println!("  Embeddings:   {}", config.embedding_url());
    println!("  Database:     {}", config.resolve_path(&config.storage.db_path).display());
    println!("  Archives:     {}", runtime.archives.root().display());
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);

    let health = runtime.lifecycle.health().await;
    println!();
    println!("  Chat model:   {} ({:?})", health.chat_model.as_deref().unwrap_or("none"), health.chat_phase);
    println!("  Embed model:  {} ({:?})", health.embed_model.as_deref().unwrap_or("none"), health.embed_phase);
    if let Some(gb) = health.memory_gb {
        println!("  Memory:       {gb:.2} GB");
    }

    let pending = runtime.store.list_tasks(Some(TaskStatus::Pending)).await?.len();
    let notes = runtime.store.list_notes().await?;
    let unsearchable = notes.iter().filter(|n| !n.is_searchable()).count();
    println!();
    println!("  Pending tasks: {pending}");
    println!("  Notes:         {} ({unsearchable} awaiting reindex)", notes.len());

    let config_file = config.base_dir().join("config.toml");
    if config_file.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `localecho onboard` first");
    }

    Ok(())
}
