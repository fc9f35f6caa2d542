//! `localecho notes` — Note maintenance.

use std::path::Path;

use localecho_tools::reindex_notes;

use crate::NotesAction;

pub async fn run(config_path: Option<&Path>, action: NotesAction) -> anyhow::Result<()> {
    let runtime = super::runtime(config_path).await?;

    match action {
        NotesAction::Reindex => {
            let report = reindex_notes(runtime.store.as_ref(), runtime.embedder.as_ref()).await?;
            println!("✅ Embedded {} note(s).", report.embedded);
            if report.failed > 0 {
                println!("⚠️  {} note(s) still unsearchable; is the embedding service up?", report.failed);
            }
        }
    }
    Ok(())
}
