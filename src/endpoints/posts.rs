use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::admin_config::ConfigStore;
use crate::auth::AdminSession;
use crate::gateway::{fetch_all_as, fetch_one_as, Gateway as _, SqliteGateway};
use crate::models::{Post, PostStatus, POST_COLLECTION};
use crate::moderation::cascade::{self, CascadeTrigger};
use crate::moderation::expiry::sweep_expired_posts;
use crate::moderation::lifecycle::derive_post_status;
use crate::moderation::severity::{severity_of, Severity};
use crate::{AppState, Result};

/// A post as the dashboard table shows it: stored fields plus the severity
/// tier driving row emphasis.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    #[serde(flatten)]
    post: Post,
    severity: Severity,
}

/// List posts for the admin table. Loading the table is what drives the
/// auto-expiry sweep; the snapshot returned reflects it.
async fn list_posts(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
) -> Result<Json<Vec<PostView>>> {
    let config = config_store.get().await?;
    let now = Utc::now();

    sweep_expired_posts(&*gateway, &config, now)
        .await
        .context("expiry sweep failed")?;

    let posts = fetch_all_as::<Post, _>(&*gateway, POST_COLLECTION, &[])
        .await
        .context("failed to list posts")?;

    let views = posts
        .into_iter()
        .map(|mut post| {
            post.status = derive_post_status(&post, &config, now);
            let severity = severity_of(post.report_count, &config.report_thresholds);
            PostView { post, severity }
        })
        .collect();

    Ok(Json(views))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveOutput {
    post: Post,
    resolved_reports: usize,
}

/// Soft-delete a post and resolve its open reports.
async fn remove_post(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Path(id): Path<String>,
) -> Result<Json<RemoveOutput>> {
    let post: Post = fetch_one_as(&*gateway, POST_COLLECTION, &id).await?;
    if post.status != PostStatus::Removed {
        gateway
            .update(POST_COLLECTION, &id, json!({"status": "removed"}), None)
            .await
            .context("failed to remove post")?;
    }

    let resolved_reports = cascade::resolve_reports_by_post_id(&*gateway, &id)
        .await
        .context("failed to resolve reports for removed post")?;

    let post: Post = fetch_one_as(&*gateway, POST_COLLECTION, &id).await?;
    Ok(Json(RemoveOutput {
        post,
        resolved_reports,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WarnOutput {
    banned: bool,
    resolved_reports: usize,
}

/// Warn the post's author. Removes the post, resolves its reports and may
/// tip the author over the ban threshold.
async fn warn_post(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
    Path(id): Path<String>,
) -> Result<Json<WarnOutput>> {
    let post: Post = fetch_one_as(&*gateway, POST_COLLECTION, &id).await?;
    let config = config_store.get().await?;

    let outcome = cascade::warn_user(
        &*gateway,
        &config,
        &post.user_id,
        CascadeTrigger::Post { post_id: id },
        Utc::now(),
    )
    .await
    .context("warn cascade failed")?;

    Ok(Json(WarnOutput {
        banned: outcome.banned,
        resolved_reports: outcome.resolved_reports,
    }))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/posts
    // AP /admin/posts/{id}/remove
    // AP /admin/posts/{id}/warn
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{id}/remove", post(remove_post))
        .route("/posts/{id}/warn", post(warn_post))
}
