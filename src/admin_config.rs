//! The tunable moderation configuration and its store.
//!
//! One versioned document holds every threshold the rule engine consumes.
//! Rule functions never read it from ambient state; callers fetch an
//! [`AdminConfig`] snapshot here and pass it down explicitly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::gateway::{Gateway, GatewayError};

pub const ADMIN_CONFIG_COLLECTION: &str = "admin_config";
/// The store holds a single configuration document under this id.
pub const ADMIN_CONFIG_ID: &str = "current";

/// Report-count thresholds for the three severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportThresholds {
    pub normal: i64,
    pub warning: i64,
    pub urgent: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
    /// How long a post stays visible, in hours.
    pub post_visibility_duration: i64,
    pub daily_free_post_limit: i64,
    pub report_thresholds: ReportThresholds,
    /// Warnings at which a user is banned.
    pub ban_threshold: i64,
    pub ban_duration_days: i64,
    pub emoji_pin_price: f64,
    pub daily_free_coin: i64,
    pub max_active_announcements: i64,
    /// Window, in hours, within which an upcoming announcement counts as
    /// urgent for the notification bell.
    pub urgent_announcement_threshold: i64,
    pub last_updated: DateTime<Utc>,
    pub updated_by: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            post_visibility_duration: 24,
            daily_free_post_limit: 3,
            report_thresholds: ReportThresholds {
                normal: 2,
                warning: 5,
                urgent: 10,
            },
            ban_threshold: 5,
            ban_duration_days: 30,
            emoji_pin_price: 10.0,
            daily_free_coin: 5,
            max_active_announcements: 10,
            urgent_announcement_threshold: 48,
            last_updated: DateTime::<Utc>::MIN_UTC,
            updated_by: "system".to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The patch failed validation; nothing was written.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Fields that must be non-negative integers when present in a patch.
const NON_NEGATIVE_FIELDS: &[&str] = &[
    "postVisibilityDuration",
    "dailyFreePostLimit",
    "banThreshold",
    "banDurationDays",
    "dailyFreeCoin",
    "maxActiveAnnouncements",
    "urgentAnnouncementThreshold",
];

/// Validate a configuration patch before any write is attempted.
///
/// Rejects negative numbers and structurally malformed threshold objects.
/// Ordering between normal/warning/urgent is deliberately not enforced here;
/// see [`ConfigStore::update`].
pub fn validate(patch: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(obj) = patch.as_object() else {
        return vec!["configuration patch must be an object".to_owned()];
    };

    for field in NON_NEGATIVE_FIELDS {
        if let Some(value) = obj.get(*field) {
            match value.as_i64() {
                Some(n) if n >= 0 => {}
                _ => errors.push(format!("{field} must be a non-negative integer")),
            }
        }
    }

    if let Some(price) = obj.get("emojiPinPrice") {
        match price.as_f64() {
            Some(p) if p >= 0.0 => {}
            _ => errors.push("emojiPinPrice must be a non-negative number".to_owned()),
        }
    }

    if let Some(thresholds) = obj.get("reportThresholds") {
        match thresholds.as_object() {
            Some(t) => {
                for tier in ["normal", "warning", "urgent"] {
                    match t.get(tier).and_then(Value::as_i64) {
                        Some(n) if n >= 0 => {}
                        _ => errors.push(format!(
                            "reportThresholds.{tier} must be a non-negative integer"
                        )),
                    }
                }
            }
            None => errors.push("reportThresholds must be an object".to_owned()),
        }
    }

    errors
}

/// Cached access to the configuration document.
pub struct ConfigStore<G> {
    gateway: Arc<G>,
    cache: RwLock<Option<(AdminConfig, i64)>>,
}

impl<G: Gateway> ConfigStore<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            cache: RwLock::new(None),
        }
    }

    /// Persist the default configuration if none exists yet. Returns whether
    /// a document was seeded.
    pub async fn seed_default(&self) -> Result<bool, ConfigError> {
        if self
            .gateway
            .fetch_by_id(ADMIN_CONFIG_COLLECTION, ADMIN_CONFIG_ID)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let config = AdminConfig {
            last_updated: Utc::now(),
            ..AdminConfig::default()
        };
        let mut doc = serde_json::to_value(&config).map_err(GatewayError::from)?;
        doc["id"] = Value::String(ADMIN_CONFIG_ID.to_owned());
        self.gateway.create(ADMIN_CONFIG_COLLECTION, doc).await?;
        Ok(true)
    }

    /// Fetch-or-default, cached. The cache is refreshed by [`Self::refresh`].
    pub async fn get(&self) -> Result<AdminConfig, ConfigError> {
        if let Some((config, _)) = self.cache.read().await.as_ref() {
            return Ok(config.clone());
        }
        Ok(self.refresh().await?.0)
    }

    /// Current configuration with its document revision, for callers that
    /// will write it back.
    pub async fn get_with_rev(&self) -> Result<(AdminConfig, i64), ConfigError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return Ok(cached.clone());
        }
        self.refresh().await
    }

    /// Re-read from the store, updating the cache. Called by the change-feed
    /// watcher whenever the configuration document changes.
    pub async fn refresh(&self) -> Result<(AdminConfig, i64), ConfigError> {
        let fetched = self
            .gateway
            .fetch_by_id(ADMIN_CONFIG_COLLECTION, ADMIN_CONFIG_ID)
            .await?;

        let entry = match fetched {
            Some(doc) => (doc.decode::<AdminConfig>()?, doc.rev),
            None => (AdminConfig::default(), 0),
        };

        *self.cache.write().await = Some(entry.clone());
        Ok(entry)
    }

    /// Validate and apply a configuration patch.
    ///
    /// `previous_rev` is the revision the caller read; a concurrent edit in
    /// another admin session surfaces as [`GatewayError::Conflict`] instead
    /// of being silently overwritten. Each successful update stamps the
    /// audit trail (lastUpdated/updatedBy).
    pub async fn update(
        &self,
        mut patch: Value,
        previous_rev: i64,
        updated_by: &str,
    ) -> Result<AdminConfig, ConfigError> {
        let errors = validate(&patch);
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        if let Some(obj) = patch.as_object_mut() {
            obj.insert(
                "lastUpdated".to_owned(),
                serde_json::to_value(Utc::now()).map_err(GatewayError::from)?,
            );
            obj.insert("updatedBy".to_owned(), Value::String(updated_by.to_owned()));
        }

        self.gateway
            .update(
                ADMIN_CONFIG_COLLECTION,
                ADMIN_CONFIG_ID,
                patch,
                Some(previous_rev),
            )
            .await?;

        let (config, _) = self.refresh().await?;

        // Tier ordering is a UI convention, not a hard invariant; accept the
        // write but flag it.
        let t = config.report_thresholds;
        if t.normal > t.warning || t.warning > t.urgent {
            warn!(
                normal = t.normal,
                warning = t.warning,
                urgent = t.urgent,
                "report thresholds are not in ascending order"
            );
        }

        Ok(config)
    }
}
