//! `localecho archives` — Browse archived sessions.

use std::path::Path;

use crate::ArchivesAction;

pub async fn run(config_path: Option<&Path>, action: ArchivesAction) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let archives = localecho_tools::ArchiveDir::new(config.resolve_path(&config.storage.archive_dir));

    match action {
        ArchivesAction::List => {
            let entries = archives.list().await?;
            if entries.is_empty() {
                println!("No archives in {}", archives.root().display());
            }
            for entry in entries {
                let when = entry
                    .modified
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("  {:<40} {:>8} B  {when}", entry.name, entry.size_bytes);
            }
        }
        ArchivesAction::Show { name } => {
            print!("{}", archives.read(&name).await?);
        }
    }
    Ok(())
}
