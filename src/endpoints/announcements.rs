use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::admin_config::ConfigStore;
use crate::auth::AdminSession;
use crate::gateway::{fetch_all_as, Gateway as _, SqliteGateway};
use crate::models::{
    Announcement, AnnouncementStatus, ANNOUNCEMENT_COLLECTION, ANNOUNCER_COLLECTION,
};
use crate::moderation::lifecycle::derive_announcement_status;
use crate::storage::{object_path, ObjectStore};
use crate::{AppState, Error, Result};

async fn list_announcements(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
) -> Result<Json<Vec<Announcement>>> {
    let now = Utc::now();
    let announcements = fetch_all_as::<Announcement, _>(&*gateway, ANNOUNCEMENT_COLLECTION, &[])
        .await
        .context("failed to list announcements")?
        .into_iter()
        .map(|mut ann| {
            ann.status = derive_announcement_status(&ann, now);
            ann
        })
        .collect();
    Ok(Json(announcements))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAnnouncement {
    title: String,
    body: String,
    department: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    #[serde(default)]
    is_urgent: bool,
    announcer_id: Option<String>,
}

async fn create_announcement(
    admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(config_store): State<Arc<ConfigStore<SqliteGateway>>>,
    Json(input): Json<CreateAnnouncement>,
) -> Result<Json<Announcement>> {
    let now = Utc::now();
    if input.end_date <= input.start_date {
        return Err(Error::bad_request(anyhow!("endDate must be after startDate")));
    }
    if input.end_date <= now {
        return Err(Error::bad_request(anyhow!("announcement window is already over")));
    }

    let status = if now < input.start_date {
        AnnouncementStatus::Scheduled
    } else {
        AnnouncementStatus::Active
    };

    // Only immediately-active announcements count against the configured cap.
    if status == AnnouncementStatus::Active {
        let config = config_store.get().await?;
        let active = fetch_all_as::<Announcement, _>(&*gateway, ANNOUNCEMENT_COLLECTION, &[])
            .await
            .context("failed to count active announcements")?
            .iter()
            .filter(|a| derive_announcement_status(a, now) == AnnouncementStatus::Active)
            .count();
        if active as i64 >= config.max_active_announcements {
            return Err(Error::bad_request(anyhow!(
                "maximum of {} active announcements reached",
                config.max_active_announcements
            )));
        }
    }

    let announcement = Announcement {
        id: Uuid::new_v4().to_string(),
        title: input.title,
        body: input.body,
        department: input.department,
        status,
        start_date: input.start_date,
        end_date: input.end_date,
        created_by_uid: admin.uid().to_owned(),
        announcer_id: input.announcer_id.clone(),
        is_urgent: input.is_urgent,
        photo_paths: Vec::new(),
        view_count: 0,
        click_count: 0,
    };

    gateway
        .create(
            ANNOUNCEMENT_COLLECTION,
            serde_json::to_value(&announcement).context("failed to encode announcement")?,
        )
        .await
        .context("failed to create announcement")?;

    if let Some(announcer_id) = &input.announcer_id {
        gateway
            .increment_field(ANNOUNCER_COLLECTION, announcer_id, "totalAnnouncements", 1)
            .await
            .context("failed to credit announcer")?;
    }

    Ok(Json(announcement))
}

async fn remove_announcement(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Path(id): Path<String>,
) -> Result<Json<Announcement>> {
    gateway
        .update(
            ANNOUNCEMENT_COLLECTION,
            &id,
            json!({"status": "removed"}),
            None,
        )
        .await?;

    let announcement =
        crate::gateway::fetch_one_as(&*gateway, ANNOUNCEMENT_COLLECTION, &id).await?;
    Ok(Json(announcement))
}

#[derive(Deserialize)]
struct PhotoParams {
    ext: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PhotoOutput {
    path: String,
    url: String,
}

/// Attach a photo to an announcement. The body is the raw image; the stored
/// path is deterministic and namespaced by the announcement id.
async fn upload_photo(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    State(objects): State<Arc<ObjectStore>>,
    Path(id): Path<String>,
    Query(params): Query<PhotoParams>,
    body: Bytes,
) -> Result<Json<PhotoOutput>> {
    let doc = gateway
        .fetch_by_id(ANNOUNCEMENT_COLLECTION, &id)
        .await?
        .ok_or_else(|| Error::not_found(anyhow!("announcement {id} not found")))?;
    let announcement: Announcement = doc.decode().map_err(Error::from)?;

    let ext = params.ext.unwrap_or_else(|| "jpg".to_owned());
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::bad_request(anyhow!("invalid photo extension")));
    }
    if body.len() as u64 > objects.limit() {
        return Err(Error::bad_request(anyhow!(
            "photo exceeds the {} byte upload limit",
            objects.limit()
        )));
    }

    let path = object_path("announcements", &id, &ext);
    objects
        .upload(&path, &body)
        .await
        .context("failed to store photo")?;

    let mut photo_paths = announcement.photo_paths;
    photo_paths.push(path.clone());
    gateway
        .update(
            ANNOUNCEMENT_COLLECTION,
            &id,
            json!({"photoPaths": photo_paths}),
            Some(doc.rev),
        )
        .await?;

    let url = objects
        .download_url(&path)
        .context("failed to build download url")?;
    Ok(Json(PhotoOutput {
        path,
        url: url.into(),
    }))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/announcements
    // AP /admin/announcements
    // AP /admin/announcements/{id}/remove
    // AP /admin/announcements/{id}/photos
    Router::new()
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route("/announcements/{id}/remove", post(remove_announcement))
        .route("/announcements/{id}/photos", post(upload_photo))
}
