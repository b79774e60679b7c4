use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::admin_config::ConfigStore;
use crate::auth::AdminSession;
use crate::gateway::{fetch_all_as, Gateway as _, SqliteGateway};
use crate::models::{User, CASCADE_LOG_COLLECTION};
use crate::moderation::cascade::{self, CascadeLog};
use crate::{AppState, Error, Result};

/// List cascade journals, failed ones included, for the repair drawer.
async fn list_cascades(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
) -> Result<Json<Vec<CascadeLog>>> {
    let logs = fetch_all_as::<CascadeLog, _>(&*gateway, CASCADE_LOG_COLLECTION, &[])
        .await
        .context("failed to list cascade logs")?;
    Ok(Json(logs))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResumeOutput {
    user: User,
    banned: bool,
    resolved_reports: usize,
}

/// Re-run a half-applied cascade. Steps already journaled as done are
/// skipped.
async fn resume_cascade(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
    Path(id): Path<String>,
) -> Result<Json<ResumeOutput>> {
    if gateway
        .fetch_by_id(CASCADE_LOG_COLLECTION, &id)
        .await?
        .is_none()
    {
        return Err(Error::not_found(anyhow!("cascade {id} not found")));
    }

    let config = config_store.get().await?;
    let outcome = cascade::resume_cascade(&*gateway, &config, &id, Utc::now())
        .await
        .context("failed to resume cascade")?;

    Ok(Json(ResumeOutput {
        banned: outcome.banned,
        resolved_reports: outcome.resolved_reports,
        user: outcome.user,
    }))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/cascades
    // AP /admin/cascades/{id}/resume
    Router::new()
        .route("/cascades", get(list_cascades))
        .route("/cascades/{id}/resume", post(resume_cascade))
}
