//! HTTP API gateway for localecho.
//!
//! Exposes the health probe and the v1 API: chat, model lifecycle, tasks,
//! notes and session archives. The gateway serves one persistent
//! conversation; chat requests are serialised on its session lock.
//!
//! Built on Axum.

pub mod api_v1;
pub mod runtime;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, extract::State, response::Json, routing::get};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use localecho_agent::Orchestrator;
use localecho_config::AppConfig;
use localecho_core::lifecycle::{HealthReport, ModelLifecycle, ModelPhase};
use localecho_core::provider::Embedder;
use localecho_core::session::SessionContext;
use localecho_core::store::{NoteStore, TaskStore};
use localecho_tools::ArchiveDir;

pub use runtime::Runtime;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub agent: Arc<Orchestrator>,
    /// The single conversation. Holding the lock serialises chat turns.
    pub session: Mutex<SessionContext>,
    pub lifecycle: Option<Arc<dyn ModelLifecycle>>,
    pub tasks: Arc<dyn TaskStore>,
    pub notes: Arc<dyn NoteStore>,
    pub embedder: Arc<dyn Embedder>,
    pub archives: ArchiveDir,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new<S>(
        config: AppConfig,
        agent: Arc<Orchestrator>,
        session: SessionContext,
        store: Arc<S>,
        embedder: Arc<dyn Embedder>,
        archives: ArchiveDir,
    ) -> Self
    where
        S: TaskStore + NoteStore + 'static,
    {
        Self {
            config,
            agent,
            session: Mutex::new(session),
            lifecycle: None,
            tasks: store.clone(),
            notes: store,
            embedder,
            archives,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn ModelLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub async fn from_runtime(runtime: &Runtime) -> Self {
        let lifecycle: Arc<dyn ModelLifecycle> = runtime.lifecycle.clone();
        Self::new(
            runtime.config.clone(),
            runtime.agent.clone(),
            runtime.session().await,
            runtime.store.clone(),
            runtime.embedder.clone(),
            runtime.archives.clone(),
        )
        .with_lifecycle(lifecycle)
    }
}

/// Build the full router: `/health` plus the v1 API under `/v1`.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:8008"),
            HeaderValue::from_static("http://127.0.0.1:8008"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server on the configured address.
pub async fn start(runtime: Runtime) -> std::io::Result<()> {
    let addr = format!("{}:{}", runtime.config.gateway.host, runtime.config.gateway.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    serve(listener, runtime).await
}

/// Serve on a bound listener. Models load in the background; `/health`
/// reports their phase meanwhile.
pub async fn serve(listener: TcpListener, runtime: Runtime) -> std::io::Result<()> {
    runtime.spawn_event_log();
    let state = Arc::new(GatewayState::from_runtime(&runtime).await);
    runtime.spawn_start_models();
    axum::serve(listener, build_router(state)).await
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthReport> {
    match &state.lifecycle {
        Some(lifecycle) => Json(lifecycle.health().await),
        None => Json(HealthReport {
            status: "ok".into(),
            chat_model: None,
            embed_model: None,
            chat_phase: ModelPhase::Unloaded,
            embed_phase: ModelPhase::Unloaded,
            memory_mb: None,
            memory_gb: None,
        }),
    }
}
