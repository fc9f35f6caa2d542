//! Semantic memory — `save_note` and `recall_notes`.
//!
//! Notes are embedded at write time. When the embedding service is down the
//! note is still stored, without a vector, and stays out of search until
//! [`reindex_notes`] backfills it.

use std::sync::Arc;

use async_trait::async_trait;
use localecho_core::error::{StoreError, ToolError};
use localecho_core::provider::Embedder;
use localecho_core::session::SessionContext;
use localecho_core::store::NoteStore;
use localecho_core::tool::{ParamKind, ParamSpec, Tool, ToolArgs};
use serde::Serialize;
use tracing::{info, warn};

use crate::text::truncate_lines;

pub const NO_RELEVANT_NOTES: &str = "No relevant notes found in memory.";
pub const QUERY_EMBEDDING_FAILED: &str = "❌ Could not generate embedding for query.";

pub struct SaveNoteTool {
    notes: Arc<dyn NoteStore>,
    embedder: Arc<dyn Embedder>,
}

impl SaveNoteTool {
    pub fn new(notes: Arc<dyn NoteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { notes, embedder }
    }
}

static SAVE_NOTE_PARAMS: [ParamSpec; 1] = [ParamSpec::required("content", ParamKind::Str)];

#[async_trait]
impl Tool for SaveNoteTool {
    fn name(&self) -> &'static str {
        "save_note"
    }

    fn description(&self) -> &'static str {
        "Save a fact or piece of information to long-term memory."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &SAVE_NOTE_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("save_note(\"My locker code is 4512\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let content = args.require_str("content")?;

        let embedding = match self.embedder.embed(content).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => {
                warn!("Embedding service returned an empty vector");
                None
            }
            Err(e) => {
                warn!(error = %e, "Embedding failed, saving note without a vector");
                None
            }
        };

        let id = self.notes.add_note(content, embedding.as_deref()).await?;
        info!(note_id = id, searchable = embedding.is_some(), "Note saved");

        Ok(match embedding {
            Some(_) => format!("✅ Saved note ID {id} to memory."),
            None => format!(
                "⚠️ Saved note ID {id} to memory, but it is not yet searchable (embedding service unavailable)."
            ),
        })
    }
}

pub struct RecallNotesTool {
    notes: Arc<dyn NoteStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    max_lines: usize,
}

impl RecallNotesTool {
    pub fn new(notes: Arc<dyn NoteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            notes,
            embedder,
            top_k: 2,
            max_lines: 50,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }
}

static RECALL_PARAMS: [ParamSpec; 1] = [ParamSpec::required("query", ParamKind::Str)];

#[async_trait]
impl Tool for RecallNotesTool {
    fn name(&self) -> &'static str {
        "recall_notes"
    }

    fn description(&self) -> &'static str {
        "Search long-term memory for notes related to the query."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &RECALL_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("recall_notes(\"locker code\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let query = args.require_str("query")?;

        let vector = match self.embedder.embed(query).await {
            Ok(vector) if !vector.is_empty() => vector,
            Ok(_) => return Ok(QUERY_EMBEDDING_FAILED.into()),
            Err(e) => {
                warn!(error = %e, "Query embedding failed");
                return Ok(QUERY_EMBEDDING_FAILED.into());
            }
        };

        let hits = self.notes.search_notes(&vector, self.top_k).await?;
        if hits.is_empty() {
            return Ok(NO_RELEVANT_NOTES.into());
        }

        let mut out = format!("Found {} note(s):", hits.len());
        for hit in &hits {
            out.push_str(&format!(
                "\n- (ID {}, {}): {}",
                hit.note.id,
                hit.note.created_at.format("%Y-%m-%d %H:%M"),
                hit.note.content
            ));
        }
        Ok(truncate_lines(&out, self.max_lines))
    }
}

/// Result of a backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub embedded: usize,
    pub failed: usize,
}

/// Embed every note stored without a vector. Already-written vectors are never replaced.
pub async fn reindex_notes(
    notes: &dyn NoteStore,
    embedder: &dyn Embedder,
) -> Result<ReindexReport, StoreError> {
    let mut report = ReindexReport::default();
    for note in notes.notes_missing_embedding().await? {
        match embedder.embed(&note.content).await {
            Ok(vector) if !vector.is_empty() => {
                if notes.set_note_embedding_if_missing(note.id, &vector).await? {
                    report.embedded += 1;
                }
            }
            Ok(_) => report.failed += 1,
            Err(e) => {
                warn!(note_id = note.id, error = %e, "Reindex embedding failed");
                report.failed += 1;
            }
        }
    }
    info!(embedded = report.embedded, failed = report.failed, "Note reindex finished");
    Ok(report)
}
