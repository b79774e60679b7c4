//! Domain entities and their document-store collection names.
//!
//! Every struct here mirrors the persisted document shape: camelCase fields,
//! soft-deleted via status flips, never removed from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection names for domain entities.
pub const USER_COLLECTION: &str = "users";
pub const POST_COLLECTION: &str = "posts";
pub const REPORT_COLLECTION: &str = "reports";
pub const ANNOUNCEMENT_COLLECTION: &str = "announcements";
pub const ANNOUNCER_COLLECTION: &str = "announcers";
pub const AFFILIATION_COLLECTION: &str = "affiliations";
pub const SPAWN_COLLECTION: &str = "ar_spawns";
pub const NOTIFICATION_COLLECTION: &str = "notifications";
pub const CASCADE_LOG_COLLECTION: &str = "moderation_ops";
pub const SESSION_COLLECTION: &str = "sessions";

/// Account standing of an end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Warning,
    Banned,
    Suspended,
}

/// An end user of the campus app, as seen by moderation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub faculty: String,
    pub status: UserStatus,
    pub warning_count: i64,
    /// End of the current ban, present while status is `banned`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_until: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

/// Lifecycle state of a post. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Expired,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    pub post_date: DateTime<Utc>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub report_count: i64,
    pub status: PostStatus,
    /// Set once this post has triggered a user warning; never cleared.
    pub is_warned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

/// A user-filed report against a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reporter_id: String,
    pub reporter_name: String,
    pub reported_user_id: String,
    pub reported_user_name: String,
    pub post_id: String,
    pub category: String,
    pub description: String,
    pub status: ReportStatus,
    pub report_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementStatus {
    Pending,
    Scheduled,
    Active,
    Expired,
    Removed,
}

/// A department announcement shown in the app feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
    pub department: String,
    pub status: AnnouncementStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by_uid: String,
    /// Announcer credited with this announcement, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcer_id: Option<String>,
    pub is_urgent: bool,
    #[serde(default)]
    pub photo_paths: Vec<String>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub click_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncerStatus {
    Active,
    Inactive,
}

/// The organization kind an announcer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliationKind {
    Faculty,
    Club,
    Office,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliation {
    pub kind: AffiliationKind,
    pub name: String,
}

/// A managed lookup entry for affiliation names. Custom names entered on an
/// announcer form are persisted here on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliationEntry {
    pub id: String,
    pub kind: AffiliationKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub affiliation: Affiliation,
    pub status: AnnouncerStatus,
    pub total_announcements: i64,
    pub joined_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnStatus {
    Active,
    Inactive,
    Scheduled,
}

/// Rarity tier of an AR spawn. Bounds the allowed catchable count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// The inclusive range of catchable counts allowed for this tier.
    pub fn catchable_range(self) -> std::ops::RangeInclusive<i64> {
        match self {
            Self::Common => 20..=100,
            Self::Uncommon => 10..=50,
            Self::Rare => 5..=20,
            Self::Epic => 2..=5,
            Self::Legendary => 1..=2,
        }
    }
}

/// A named fixed spawn location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedLocation {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// Spawn geometry: either one point or a list of named fixed locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SpawnGeometry {
    Point { lat: f64, lng: f64 },
    Locations { locations: Vec<NamedLocation> },
}

/// An AR-model spawn point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArSpawn {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub rarity: Rarity,
    pub catchable_count: i64,
    pub geometry: SpawnGeometry,
    pub catch_radius_m: f64,
    pub reveal_radius_m: f64,
    pub point: i64,
    pub coin_value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Stored status; display paths derive the effective one from the times.
    pub status: SpawnStatus,
}

/// An in-app notice delivered to a user by a moderation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// An admin dashboard session. Seeded at first startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub uid: String,
    pub created_at: DateTime<Utc>,
}
