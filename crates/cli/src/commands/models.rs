//! `localecho models` — Inspect and switch models.

use std::path::Path;

use localecho_core::lifecycle::{ModelEntry, ModelKind, ModelLifecycle};

use crate::ModelsAction;

pub async fn run(config_path: Option<&Path>, action: ModelsAction) -> anyhow::Result<()> {
    let runtime = super::runtime(config_path).await?;
    let lifecycle = &runtime.lifecycle;

    match action {
        ModelsAction::List => {
            let listing = lifecycle.list_models().await;
            print_entries("Chat models", &listing.chat);
            println!();
            print_entries("Embedding models", &listing.embed);
        }
        ModelsAction::Swap { path, embedding } => {
            let kind = if embedding {
                ModelKind::Embedding
            } else {
                ModelKind::Chat
            };
            let outcome = lifecycle.swap(kind, &path).await;
            if outcome.is_ok() {
                println!("✅ {}", outcome.message);
            } else {
                println!("❌ {}", outcome.message);
            }
            if let Some(active) = outcome.active {
                println!("   Active {kind} model: {active}");
            }
        }
        ModelsAction::Sleep => {
            lifecycle.sleep().await?;
            println!("💤 Models unloaded.");
        }
        ModelsAction::Wake => {
            lifecycle.wake().await?;
            println!("✅ Models reloaded.");
        }
    }

    Ok(())
}

fn print_entries(title: &str, entries: &[ModelEntry]) {
    println!("{title}:");
    if entries.is_empty() {
        println!("  (none installed)");
    }
    for entry in entries {
        let marker = if entry.selected { "*" } else { " " };
        println!("  {marker} {:<40} {}", entry.name, entry.id);
    }
}
