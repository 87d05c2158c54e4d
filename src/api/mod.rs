//! REST API server for podium.
//!
//! Provides HTTP endpoints for:
//! - Presentation upload and retrieval
//! - Explicit slide-conversion poll triggering
//! - Ordered clip submission

pub mod error;
pub mod routes;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, SessionConfig};
use crate::poller::{PollerRegistry, SlidePoller};
use crate::storage::ObjectStoreGateway;

use error::ApiError;

pub use session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ObjectStoreGateway>,
    pub db_path: PathBuf,
    pub sessions: SessionStore,
    pub pollers: PollerRegistry,
    pub poller: Arc<SlidePoller>,
    pub session_config: SessionConfig,
    /// Body cap for the multipart upload routes.
    pub max_upload_bytes: usize,
}

pub struct ApiServer {
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState, config: &Config) -> Self {
        Self {
            port: config.server.port,
            state,
        }
    }

    pub fn router(state: AppState) -> Router {
        // PDF and clip uploads run far past axum's 2 MiB default
        let max_upload_bytes = state.max_upload_bytes;
        Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .route("/session", post(open_session))
            .merge(routes::presentations::router())
            .merge(routes::clips::router())
            .layer(DefaultBodyLimit::max(max_upload_bytes))
            .with_state(state)
    }

    pub async fn start(self) -> Result<()> {
        let app = Self::router(self.state);

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET   /                        - Service info");
        info!("  GET   /version                 - Get version info");
        info!("  POST  /presentations           - Upload a PDF, start slide conversion");
        info!("  GET   /presentations           - List presentations");
        info!("  GET   /presentations/:id       - Get one presentation (202 while converting)");
        info!("  PATCH /presentations/:id       - Rename a presentation");
        info!("  POST  /presentations/:id/poll  - Re-trigger completion polling");
        info!("  POST  /presentations/:id/clip  - Submit one slide's video+audio clip");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Run a repository operation on a fresh connection off the async runtime.
pub(crate) async fn with_db<T, F>(db_path: PathBuf, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = crate::db::open(&db_path)?;
        f(&conn)
    })
    .await
    .map_err(|_| ApiError::internal("Database task panicked"))?
    .map_err(|e| ApiError::internal(e.to_string()))
}

#[derive(Debug, serde::Deserialize)]
struct OpenSessionRequest {
    #[serde(rename = "userId")]
    user_id: String,
}

/// Issue a session cookie for a user id. Identity verification happens
/// upstream; this service only needs a stable user handle per session.
async fn open_session(
    State(state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<Response, ApiError> {
    if request.user_id.is_empty() {
        return Err(ApiError::validation("Missing 'userId' field."));
    }

    let session_id = Uuid::new_v4().to_string();
    state.sessions.insert(&session_id, &request.user_id);

    let cookie = session::session_cookie(&state.session_config, &session_id);
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Session created." })),
    )
        .into_response())
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "podium",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "podium"
    }))
}
