use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::admin_config::ConfigStore;
use crate::auth::AdminSession;
use crate::gateway::{fetch_all_as, fetch_one_as, Gateway as _, SqliteGateway};
use crate::models::{Report, ReportStatus, User, REPORT_COLLECTION};
use crate::moderation::cascade::{self, CascadeTrigger};
use crate::{AppState, Error, Result};

async fn list_reports(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
) -> Result<Json<Vec<Report>>> {
    let reports = fetch_all_as::<Report, _>(&*gateway, REPORT_COLLECTION, &[])
        .await
        .context("failed to list reports")?;
    Ok(Json(reports))
}

async fn transition_report(
    gateway: &SqliteGateway,
    id: &str,
    to: ReportStatus,
) -> Result<Json<Report>> {
    let report: Report = fetch_one_as(gateway, REPORT_COLLECTION, id).await?;
    if report.status != ReportStatus::Pending {
        return Err(Error::bad_request(anyhow!(
            "report {id} is not pending"
        )));
    }

    let status = serde_json::to_value(to).context("failed to encode status")?;
    gateway
        .update(REPORT_COLLECTION, id, json!({"status": status}), None)
        .await
        .context("failed to update report")?;

    let report: Report = fetch_one_as(gateway, REPORT_COLLECTION, id).await?;
    Ok(Json(report))
}

async fn resolve_report(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Path(id): Path<String>,
) -> Result<Json<Report>> {
    transition_report(&gateway, &id, ReportStatus::Resolved).await
}

async fn dismiss_report(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Path(id): Path<String>,
) -> Result<Json<Report>> {
    transition_report(&gateway, &id, ReportStatus::Dismissed).await
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WarnOutput {
    user: User,
    banned: bool,
    resolved_reports: usize,
}

/// Warn the reported user from the report drawer. Removes the reported post
/// and resolves every pending report against it, this one included.
async fn warn_reported_user(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
    Path(id): Path<String>,
) -> Result<Json<WarnOutput>> {
    let report: Report = fetch_one_as(&*gateway, REPORT_COLLECTION, &id).await?;
    let config = config_store.get().await?;

    let outcome = cascade::warn_user(
        &*gateway,
        &config,
        &report.reported_user_id,
        CascadeTrigger::Report {
            report_id: id,
            post_id: report.post_id.clone(),
        },
        Utc::now(),
    )
    .await
    .context("warn cascade failed")?;

    Ok(Json(WarnOutput {
        banned: outcome.banned,
        resolved_reports: outcome.resolved_reports,
        user: outcome.user,
    }))
}

#[derive(Deserialize)]
struct SuspendInput {
    suspended: bool,
}

/// Suspend/unsuspend the reported user. The report-context counterpart of
/// the ban toggle; no cascade.
async fn suspend_reported_user(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Path(id): Path<String>,
    Json(input): Json<SuspendInput>,
) -> Result<Json<User>> {
    let report: Report = fetch_one_as(&*gateway, REPORT_COLLECTION, &id).await?;
    let user = cascade::set_suspended(&*gateway, &report.reported_user_id, input.suspended)
        .await
        .context("failed to toggle suspension")?;
    Ok(Json(user))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/reports
    // AP /admin/reports/{id}/resolve
    // AP /admin/reports/{id}/dismiss
    // AP /admin/reports/{id}/warn
    // AP /admin/reports/{id}/suspend
    Router::new()
        .route("/reports", get(list_reports))
        .route("/reports/{id}/resolve", post(resolve_report))
        .route("/reports/{id}/dismiss", post(dismiss_report))
        .route("/reports/{id}/warn", post(warn_reported_user))
        .route("/reports/{id}/suspend", post(suspend_reported_user))
}
