use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::admin_config::ConfigStore;
use crate::auth::AdminSession;
use crate::bell::BellProducer;
use crate::gateway::SqliteGateway;
use crate::moderation::notify::UrgentSummary;
use crate::{AppState, Result};

/// One-shot snapshot of the bell badge.
async fn bell_snapshot(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
) -> Result<Json<UrgentSummary>> {
    let summary = crate::bell::compute_summary(&*gateway, &config_store)
        .await
        .context("failed to compute bell summary")?;
    Ok(Json(summary))
}

/// Live bell feed: each urgent-summary change is pushed as one JSON text
/// frame.
async fn bell_ws(State(bell): State<BellProducer>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move { bell.client_connection(socket).await })
}

pub fn routes() -> Router<AppState> {
    // AG /admin/bell
    // UG /admin/bell/ws
    Router::new()
        .route("/bell", get(bell_snapshot))
        .route("/bell/ws", get(bell_ws))
}
