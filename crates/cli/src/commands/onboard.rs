//! `localecho onboard` — First-time setup.

use std::path::Path;

use localecho_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };
    let config_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_dir);

    println!("🔊 localecho — First-Time Setup");
    println!("===============================\n");

    if !config_dir.exists() {
        tokio::fs::create_dir_all(&config_dir).await?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config file exists: {}", config_path.display());
    } else {
        tokio::fs::write(&config_path, AppConfig::default_toml()).await?;
        println!("✅ Created config file: {}", config_path.display());
    }

    let defaults = AppConfig::default();
    for dir in [&defaults.storage.archive_dir, "models/chat", "models/embeddings"] {
        let path = config_dir.join(dir);
        if !path.exists() {
            tokio::fs::create_dir_all(&path).await?;
            println!("✅ Created {}", path.display());
        }
    }

    println!("\nNext steps:");
    println!("  1. Put MLX model directories under {}", config_dir.join("models").display());
    println!("  2. Point [inference] base_url at your local server");
    println!("  3. Run `localecho agent` to start chatting");

    Ok(())
}
