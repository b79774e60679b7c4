use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::gateway::{fetch_all_as, fetch_one_as, Filter, Gateway as _, SqliteGateway};
use crate::models::{
    Affiliation, AffiliationEntry, Announcer, AnnouncerStatus, AFFILIATION_COLLECTION,
    ANNOUNCER_COLLECTION,
};
use crate::{AppState, Result};

async fn list_announcers(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
) -> Result<Json<Vec<Announcer>>> {
    let announcers = fetch_all_as::<Announcer, _>(&*gateway, ANNOUNCER_COLLECTION, &[])
        .await
        .context("failed to list announcers")?;
    Ok(Json(announcers))
}

async fn list_affiliations(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
) -> Result<Json<Vec<AffiliationEntry>>> {
    let entries = fetch_all_as::<AffiliationEntry, _>(&*gateway, AFFILIATION_COLLECTION, &[])
        .await
        .context("failed to list affiliations")?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAnnouncer {
    name: String,
    email: String,
    affiliation: Affiliation,
}

async fn create_announcer(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Json(input): Json<CreateAnnouncer>,
) -> Result<Json<Announcer>> {
    // A custom affiliation name becomes a managed lookup entry the next form
    // can offer.
    let known = fetch_all_as::<AffiliationEntry, _>(
        &*gateway,
        AFFILIATION_COLLECTION,
        &[Filter::eq("name", input.affiliation.name.clone())],
    )
    .await
    .context("failed to check affiliation lookup")?;

    if known.is_empty() {
        let entry = AffiliationEntry {
            id: Uuid::new_v4().to_string(),
            kind: input.affiliation.kind,
            name: input.affiliation.name.clone(),
        };
        gateway
            .create(
                AFFILIATION_COLLECTION,
                serde_json::to_value(&entry).context("failed to encode affiliation")?,
            )
            .await
            .context("failed to persist custom affiliation")?;
    }

    let announcer = Announcer {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        email: input.email,
        affiliation: input.affiliation,
        status: AnnouncerStatus::Active,
        total_announcements: 0,
        joined_date: Utc::now(),
    };

    gateway
        .create(
            ANNOUNCER_COLLECTION,
            serde_json::to_value(&announcer).context("failed to encode announcer")?,
        )
        .await
        .context("failed to create announcer")?;

    Ok(Json(announcer))
}

/// Flip an announcer between active and inactive.
async fn toggle_announcer(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Path(id): Path<String>,
) -> Result<Json<Announcer>> {
    let announcer: Announcer = fetch_one_as(&*gateway, ANNOUNCER_COLLECTION, &id).await?;
    let status = match announcer.status {
        AnnouncerStatus::Active => "inactive",
        AnnouncerStatus::Inactive => "active",
    };

    gateway
        .update(ANNOUNCER_COLLECTION, &id, json!({"status": status}), None)
        .await
        .context("failed to toggle announcer")?;

    let announcer: Announcer = fetch_one_as(&*gateway, ANNOUNCER_COLLECTION, &id).await?;
    Ok(Json(announcer))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/announcers
    // AP /admin/announcers
    // AP /admin/announcers/{id}/toggle
    // AG /admin/affiliations
    Router::new()
        .route("/announcers", get(list_announcers).post(create_announcer))
        .route("/announcers/{id}/toggle", post(toggle_announcer))
        .route("/affiliations", get(list_affiliations))
}
