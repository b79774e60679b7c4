use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::admin_config::{AdminConfig, ConfigStore};
use crate::auth::AdminSession;
use crate::gateway::SqliteGateway;
use crate::{AppState, Result};

/// The configuration document plus the revision a subsequent update must
/// present.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigView {
    #[serde(flatten)]
    config: AdminConfig,
    rev: i64,
}

async fn get_config(
    _admin: AdminSession,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
) -> Result<Json<ConfigView>> {
    let (config, rev) = config_store.get_with_rev().await?;
    Ok(Json(ConfigView { config, rev }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateConfigInput {
    /// Revision the dashboard read before editing. A stale value means a
    /// concurrent edit happened and yields 409.
    previous_rev: i64,
    changes: serde_json::Value,
}

async fn put_config(
    admin: AdminSession,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
    Json(input): Json<UpdateConfigInput>,
) -> Result<Json<ConfigView>> {
    let config = config_store
        .update(input.changes, input.previous_rev, admin.uid())
        .await?;
    let (_, rev) = config_store.get_with_rev().await?;
    Ok(Json(ConfigView { config, rev }))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/config
    // AU /admin/config
    Router::new().route("/config", get(get_config).put(put_config))
}
