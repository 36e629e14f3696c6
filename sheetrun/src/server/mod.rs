//! Sheetrun server - one WebSocket session per client run.
//!
//! Architecture:
//! - Each `/ws` connection carries one session lifecycle: a start
//!   request, streamed terminal output, and a final exit or error event
//! - The session runner owns all remote resources; the server only
//!   upgrades sockets and exposes read-only observability
//!
//! Endpoints:
//! - WS /ws - client channel (start, input, output, exit)
//! - GET /api/sessions - live session summaries
//! - GET /api/health - liveness probe

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{State, WebSocketUpgrade},
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::SessionInfo;
use crate::session::{self, SessionManager};
use crate::store::SheetStore;
use crate::transport::RemoteTransport;

/// Shared server state.
#[derive(Debug)]
pub struct AppState {
    /// Deployment configuration.
    pub config: Config,
    /// Collaborator store supplying file sets. Safe for concurrent reads.
    pub store: Arc<dyn SheetStore>,
    /// Remote transport factory.
    pub transport: Arc<dyn RemoteTransport>,
    /// Live session registry.
    pub sessions: SessionManager,
}

/// Start the server.
pub async fn start_server(state: Arc<AppState>, port: u16) -> Result<()> {
    let cors = build_cors(state.config.allowed_origin.as_deref())?;

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("sheetrun listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn build_cors(allowed_origin: Option<&str>) -> Result<CorsLayer> {
    let layer = match allowed_origin {
        None => CorsLayer::permissive(),
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .context("invalid SHEETRUN_ALLOWED_ORIGIN")?,
            )
            .allow_methods(Any)
            .allow_headers(Any),
    };
    Ok(layer)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(state, socket))
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.list().await)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
