//! HTTP status endpoint — exposes node state as JSON.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use loadpair_core::QueueSnapshot;
use loadpair_services::{NodeIdentity, PeerBinding, QueueStore};

#[derive(Clone)]
pub struct StatusState {
    pub identity: NodeIdentity,
    pub store: QueueStore,
    pub binding: PeerBinding,
}

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub listen_port: u16,
    pub peer:        Option<String>,
    pub queues:      QueueSnapshot,
}

async fn handle_status(State(state): State<StatusState>) -> Json<StatusResponse> {
    let peer = state.binding.get();
    Json(StatusResponse {
        listen_port: state.identity.listen_port,
        peer:        peer.map(|p| p.to_string()),
        queues:      state.store.snapshot(peer.is_some()),
    })
}

// ── Router ────────────────────────────────────────────────────────────────────

pub async fn serve(state: StatusState, port: u16) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/status", get(handle_status))
        .with_state(state)
        .layer(cors);

    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "status endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}
