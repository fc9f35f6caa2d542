//! Session context — the explicit working memory of the single conversation.
//!
//! The context is passed by `&mut` through the orchestration loop and into
//! tools, so nothing in the system reads conversation state from globals.

use tracing::debug;

use crate::error::StoreError;
use crate::message::{ChatTurn, Role};
use crate::store::ChatLog;

/// How many persisted turns are replayed into memory on restore.
pub const RESTORE_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    history: Vec<ChatTurn>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
        }
    }

    /// Rebuild working memory from the persisted chat log.
    pub async fn restore(
        session_id: impl Into<String>,
        log: &dyn ChatLog,
    ) -> std::result::Result<Self, StoreError> {
        let session_id = session_id.into();
        let history = log.recent_turns(&session_id, RESTORE_LIMIT).await?;
        debug!(session = %session_id, turns = history.len(), "Restored session history");
        Ok(Self {
            session_id,
            history,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatTurn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.history
            .push(ChatTurn::new(self.session_id.clone(), role, content));
        if self.history.len() > RESTORE_LIMIT * 2 {
            let excess = self.history.len() - RESTORE_LIMIT;
            self.history.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
