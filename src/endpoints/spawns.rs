use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::gateway::{fetch_all_as, Gateway as _, SqliteGateway};
use crate::models::{ArSpawn, Rarity, SpawnGeometry, SPAWN_COLLECTION};
use crate::moderation::lifecycle::derive_spawn_status;
use crate::{AppState, Error, Result};

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_owned()
}

fn validate_spawn(rarity: Rarity, catchable_count: i64, catch_radius_m: f64, reveal_radius_m: f64) -> Result<()> {
    let range = rarity.catchable_range();
    if !range.contains(&catchable_count) {
        return Err(Error::bad_request(anyhow!(
            "catchableCount for {:?} rarity must be within {}..={}",
            rarity,
            range.start(),
            range.end()
        )));
    }
    if catch_radius_m <= 0.0 || reveal_radius_m <= 0.0 {
        return Err(Error::bad_request(anyhow!("radii must be positive")));
    }
    if catch_radius_m > reveal_radius_m {
        return Err(Error::bad_request(anyhow!(
            "catch radius cannot exceed reveal radius"
        )));
    }
    Ok(())
}

async fn list_spawns(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
) -> Result<Json<Vec<ArSpawn>>> {
    let now = Utc::now();
    let spawns = fetch_all_as::<ArSpawn, _>(&*gateway, SPAWN_COLLECTION, &[])
        .await
        .context("failed to list spawns")?
        .into_iter()
        .map(|mut spawn| {
            spawn.status = derive_spawn_status(&spawn, now);
            spawn
        })
        .collect();
    Ok(Json(spawns))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSpawn {
    name: String,
    slug: Option<String>,
    category: String,
    rarity: Rarity,
    catchable_count: i64,
    geometry: SpawnGeometry,
    catch_radius_m: f64,
    reveal_radius_m: f64,
    point: i64,
    coin_value: i64,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

async fn create_spawn(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Json(input): Json<CreateSpawn>,
) -> Result<Json<ArSpawn>> {
    validate_spawn(
        input.rarity,
        input.catchable_count,
        input.catch_radius_m,
        input.reveal_radius_m,
    )?;

    let now = Utc::now();
    let mut spawn = ArSpawn {
        id: Uuid::new_v4().to_string(),
        slug: input.slug.unwrap_or_else(|| slugify(&input.name)),
        name: input.name,
        category: input.category,
        rarity: input.rarity,
        catchable_count: input.catchable_count,
        geometry: input.geometry,
        catch_radius_m: input.catch_radius_m,
        reveal_radius_m: input.reveal_radius_m,
        point: input.point,
        coin_value: input.coin_value,
        start_time: input.start_time,
        end_time: input.end_time,
        status: crate::models::SpawnStatus::Active,
    };
    spawn.status = derive_spawn_status(&spawn, now);

    gateway
        .create(
            SPAWN_COLLECTION,
            serde_json::to_value(&spawn).context("failed to encode spawn")?,
        )
        .await
        .context("failed to create spawn")?;

    Ok(Json(spawn))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSpawn {
    name: Option<String>,
    category: Option<String>,
    rarity: Option<Rarity>,
    catchable_count: Option<i64>,
    geometry: Option<SpawnGeometry>,
    catch_radius_m: Option<f64>,
    reveal_radius_m: Option<f64>,
    point: Option<i64>,
    coin_value: Option<i64>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

/// Update a spawn. The whole document is re-validated and written back with
/// a revision check, so two admins editing the same spawn conflict instead
/// of overwriting each other.
async fn update_spawn(
    _admin: AdminSession,
    State(gateway): State<Arc<SqliteGateway>>,
    Path(id): Path<String>,
    Json(input): Json<UpdateSpawn>,
) -> Result<Json<ArSpawn>> {
    let doc = gateway
        .fetch_by_id(SPAWN_COLLECTION, &id)
        .await?
        .ok_or_else(|| Error::not_found(anyhow!("spawn {id} not found")))?;
    let mut spawn: ArSpawn = doc.decode().map_err(Error::from)?;

    if let Some(name) = input.name {
        spawn.slug = slugify(&name);
        spawn.name = name;
    }
    if let Some(category) = input.category {
        spawn.category = category;
    }
    if let Some(rarity) = input.rarity {
        spawn.rarity = rarity;
    }
    if let Some(count) = input.catchable_count {
        spawn.catchable_count = count;
    }
    if let Some(geometry) = input.geometry {
        spawn.geometry = geometry;
    }
    if let Some(radius) = input.catch_radius_m {
        spawn.catch_radius_m = radius;
    }
    if let Some(radius) = input.reveal_radius_m {
        spawn.reveal_radius_m = radius;
    }
    if let Some(point) = input.point {
        spawn.point = point;
    }
    if let Some(coin_value) = input.coin_value {
        spawn.coin_value = coin_value;
    }
    if input.start_time.is_some() {
        spawn.start_time = input.start_time;
    }
    if input.end_time.is_some() {
        spawn.end_time = input.end_time;
    }

    validate_spawn(
        spawn.rarity,
        spawn.catchable_count,
        spawn.catch_radius_m,
        spawn.reveal_radius_m,
    )?;
    spawn.status = derive_spawn_status(&spawn, Utc::now());

    gateway
        .update(
            SPAWN_COLLECTION,
            &id,
            serde_json::to_value(&spawn).context("failed to encode spawn")?,
            Some(doc.rev),
        )
        .await?;

    Ok(Json(spawn))
}

pub fn routes() -> Router<AppState> {
    // AG /admin/spawns
    // AP /admin/spawns
    // AU /admin/spawns/{id}
    Router::new()
        .route("/spawns", get(list_spawns).post(create_spawn))
        .route("/spawns/{id}", put(update_spawn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_names() {
        assert_eq!(slugify("Campus Mascot"), "campus-mascot");
        assert_eq!(slugify("  Golden  Owl!  "), "golden-owl");
        assert_eq!(slugify("árvíztűrő"), "rv-zt-r");
    }

    #[test]
    fn rarity_bounds_catchable_count() {
        assert!(validate_spawn(Rarity::Legendary, 2, 5.0, 50.0).is_ok());
        assert!(validate_spawn(Rarity::Legendary, 3, 5.0, 50.0).is_err());
        assert!(validate_spawn(Rarity::Common, 19, 5.0, 50.0).is_err());
        assert!(validate_spawn(Rarity::Rare, 20, 60.0, 50.0).is_err());
    }
}
