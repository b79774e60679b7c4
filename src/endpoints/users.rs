use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::admin_config::ConfigStore;
use crate::auth::AdminSession;
use crate::gateway::{fetch_all_as, SqliteGateway};
use crate::models::{User, USER_COLLECTION};
use crate::moderation::cascade::{self, CascadeTrigger};
use crate::{AppState, Result};

async fn list_users(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
) -> Result<Json<Vec<User>>> {
    let users = fetch_all_as::<User, _>(&*gateway, USER_COLLECTION, &[])
        .await
        .context("failed to list users")?;
    Ok(Json(users))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WarnOutput {
    user: User,
    banned: bool,
    resolved_reports: usize,
}

/// Warn a user from the user table. Cascades across all of their posts.
async fn warn_user(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
    Path(id): Path<String>,
) -> Result<Json<WarnOutput>> {
    let config = config_store.get().await?;
    let outcome = cascade::warn_user(&*gateway, &config, &id, CascadeTrigger::User, Utc::now())
        .await
        .context("warn cascade failed")?;

    Ok(Json(WarnOutput {
        banned: outcome.banned,
        resolved_reports: outcome.resolved_reports,
        user: outcome.user,
    }))
}

#[derive(Deserialize)]
struct BanInput {
    banned: bool,
}

/// Ban/unban toggle. The dashboard confirms before calling; this is the
/// confirmed action.
async fn set_ban(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
    Path(id): Path<String>,
    Json(input): Json<BanInput>,
) -> Result<Json<User>> {
    let config = config_store.get().await?;
    let user = cascade::set_ban(&*gateway, &config, &id, input.banned, Utc::now())
        .await
        .context("failed to toggle ban")?;
    Ok(Json(user))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/users
    // AP /admin/users/{id}/warn
    // AP /admin/users/{id}/ban
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/warn", post(warn_user))
        .route("/users/{id}/ban", post(set_ban))
}
