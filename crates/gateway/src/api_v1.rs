//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`              — Send a message, get the agent's reply
//! - `GET    /v1/models`            — Installed chat and embedding models
//! - `POST   /v1/models/swap`       — Swap the chat or embedding model
//! - `POST   /v1/models/sleep`      — Release every loaded model
//! - `POST   /v1/models/wake`       — Reload the last selection
//! - `GET    /v1/tasks`             — List tasks, optionally by status
//! - `POST   /v1/tasks`             — Add a task
//! - `GET    /v1/tasks/archived`    — List archived tasks
//! - `GET    /v1/notes`             — List notes
//! - `POST   /v1/notes`             — Save a note
//! - `POST   /v1/notes/reindex`     — Embed notes stored without a vector
//! - `GET    /v1/archives`          — List session archives
//! - `GET    /v1/archives/{name}`   — Read one archive
//! - `DELETE /v1/archives/{name}`   — Delete one archive

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use localecho_core::error::{LifecycleError, StoreError};
use localecho_core::lifecycle::{ModelKind, ModelLifecycle, ModelListing, SwapOutcome};
use localecho_core::provider::Embedder;
use localecho_core::store::{Note, NoteStore, Task, TaskStatus, TaskStore};
use localecho_tools::{ArchiveEntry, ArchiveError, ReindexReport, reindex_notes};

use crate::SharedState;

/// Build the v1 router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/models", get(list_models_handler))
        .route("/models/swap", post(swap_model_handler))
        .route("/models/sleep", post(sleep_handler))
        .route("/models/wake", post(wake_handler))
        .route("/tasks", get(list_tasks_handler).post(add_task_handler))
        .route("/tasks/archived", get(archived_tasks_handler))
        .route("/notes", get(list_notes_handler).post(add_note_handler))
        .route("/notes/reindex", post(reindex_handler))
        .route("/archives", get(list_archives_handler))
        .route(
            "/archives/{name}",
            get(read_archive_handler).delete(delete_archive_handler),
        )
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn store_error(e: StoreError) -> ApiError {
    warn!(error = %e, "Store request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn lifecycle_error(e: LifecycleError) -> ApiError {
    let status = match &e {
        LifecycleError::Busy { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LifecycleError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

fn archive_error(e: ArchiveError) -> ApiError {
    let status = match &e {
        ArchiveError::InvalidName(_) => StatusCode::BAD_REQUEST,
        ArchiveError::NotFound(_) => StatusCode::NOT_FOUND,
        ArchiveError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

fn lifecycle_of(state: &SharedState) -> ApiResult<&Arc<dyn ModelLifecycle>> {
    state.lifecycle.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Model lifecycle manager is not configured",
        )
    })
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if req.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    let mut session = state.session.lock().await;
    let response = state.agent.process_input(&mut session, &req.message).await;
    Ok(Json(ChatResponse { response }))
}

// ── Models ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SwapRequest {
    pub model_path: String,
    #[serde(rename = "type", default)]
    pub kind: Option<ModelKind>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub status: &'static str,
    pub message: String,
}

async fn list_models_handler(State(state): State<SharedState>) -> ApiResult<Json<ModelListing>> {
    let lifecycle = lifecycle_of(&state)?;
    Ok(Json(lifecycle.list_models().await))
}

async fn swap_model_handler(
    State(state): State<SharedState>,
    Json(req): Json<SwapRequest>,
) -> ApiResult<(StatusCode, Json<SwapOutcome>)> {
    let lifecycle = lifecycle_of(&state)?;
    let kind = req.kind.unwrap_or(ModelKind::Chat);
    info!(kind = %kind, path = %req.model_path, "Swap requested over HTTP");

    let outcome = lifecycle.swap(kind, &req.model_path).await;
    let status = if outcome.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(outcome)))
}

async fn sleep_handler(State(state): State<SharedState>) -> ApiResult<Json<ActionResponse>> {
    let lifecycle = lifecycle_of(&state)?;
    lifecycle.sleep().await.map_err(lifecycle_error)?;
    Ok(Json(ActionResponse {
        status: "ok",
        message: "Models unloaded".into(),
    }))
}

async fn wake_handler(State(state): State<SharedState>) -> ApiResult<Json<ActionResponse>> {
    let lifecycle = lifecycle_of(&state)?;
    lifecycle.wake().await.map_err(lifecycle_error)?;
    Ok(Json(ActionResponse {
        status: "ok",
        message: "Models reloaded".into(),
    }))
}

// ── Tasks ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewTask {
    pub description: String,
    pub due_date: Option<String>,
}

async fn list_tasks_handler(
    State(state): State<SharedState>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(TaskStatus::parse(raw).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("Unknown task status '{raw}'"))
        })?),
    };
    let tasks = state.tasks.list_tasks(status).await.map_err(store_error)?;
    Ok(Json(tasks))
}

async fn add_task_handler(
    State(state): State<SharedState>,
    Json(req): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let description = req.description.trim();
    if description.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "description must not be empty",
        ));
    }

    let due = req.due_date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let id = state
        .tasks
        .add_task(description, due)
        .await
        .map_err(store_error)?;
    let task = state
        .tasks
        .get_task(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Task vanished after insert"))?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn archived_tasks_handler(State(state): State<SharedState>) -> ApiResult<Json<Vec<Task>>> {
    let tasks = state.tasks.list_archived_tasks().await.map_err(store_error)?;
    Ok(Json(tasks))
}

// ── Notes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NewNote {
    pub content: String,
}

/// A note as the API shows it: the vector itself stays internal.
#[derive(Debug, Serialize)]
pub struct NoteView {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub searchable: bool,
}

impl From<Note> for NoteView {
    fn from(note: Note) -> Self {
        Self {
            searchable: note.is_searchable(),
            id: note.id,
            content: note.content,
            created_at: note.created_at,
        }
    }
}

async fn list_notes_handler(State(state): State<SharedState>) -> ApiResult<Json<Vec<NoteView>>> {
    let notes = state.notes.list_notes().await.map_err(store_error)?;
    Ok(Json(notes.into_iter().map(NoteView::from).collect()))
}

async fn add_note_handler(
    State(state): State<SharedState>,
    Json(req): Json<NewNote>,
) -> ApiResult<(StatusCode, Json<NoteView>)> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "content must not be empty"));
    }

    // Stored either way; a note without a vector waits for reindex.
    let embedding = match state.embedder.embed(content).await {
        Ok(vector) if !vector.is_empty() => Some(vector),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Embedding failed, saving note without a vector");
            None
        }
    };
    let id = state
        .notes
        .add_note(content, embedding.as_deref())
        .await
        .map_err(store_error)?;
    let note = state
        .notes
        .get_note(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Note vanished after insert"))?;
    Ok((StatusCode::CREATED, Json(note.into())))
}

async fn reindex_handler(State(state): State<SharedState>) -> ApiResult<Json<ReindexReport>> {
    let report = reindex_notes(state.notes.as_ref(), state.embedder.as_ref())
        .await
        .map_err(store_error)?;
    Ok(Json(report))
}

// ── Archives ──────────────────────────────────────────────────────────────

async fn list_archives_handler(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<ArchiveEntry>>> {
    let entries = state.archives.list().await.map_err(archive_error)?;
    Ok(Json(entries))
}

async fn read_archive_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let content = state.archives.read(&name).await.map_err(archive_error)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], content))
}

async fn delete_archive_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.archives.delete(&name).await.map_err(archive_error)?;
    info!(archive = %name, "Archive deleted over HTTP");
    Ok(StatusCode::NO_CONTENT)
}
