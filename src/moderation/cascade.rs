//! Warning/ban cascades and report resolution.
//!
//! A cascade is a sequence of dependent writes triggered by one admin action.
//! The document store gives us no multi-document transactions, so each
//! cascade is journaled as a state-tagged operation log: every step records
//! its completion before the next begins, and every step checks current state
//! before applying. A cascade that died halfway can therefore be resumed
//! without double-counting the warning or re-removing posts.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::admin_config::AdminConfig;
use crate::gateway::{fetch_all_as, fetch_one_as, Filter, Gateway};
use crate::metrics::{MOD_BANS, MOD_CASCADES_RESUMED, MOD_REPORTS_RESOLVED, MOD_WARNINGS};
use crate::models::{
    Notification, Post, PostStatus, Report, ReportStatus, User, UserStatus,
    CASCADE_LOG_COLLECTION, NOTIFICATION_COLLECTION, POST_COLLECTION, REPORT_COLLECTION,
    USER_COLLECTION,
};

/// What started a cascade. Post and report contexts carry the post whose
/// reports the cascade will resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CascadeTrigger {
    User,
    #[serde(rename_all = "camelCase")]
    Post { post_id: String },
    #[serde(rename_all = "camelCase")]
    Report { report_id: String, post_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeStatus {
    Running,
    Completed,
    Failed,
}

/// The persisted operation log for one cascade. Step flags flip to true as
/// each write commits; `post_ids` is filled once the affected posts are
/// known so the report-resolution step survives a resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeLog {
    pub id: String,
    pub user_id: String,
    pub trigger: CascadeTrigger,
    #[serde(default)]
    pub post_ids: Vec<String>,
    pub warning_incremented: bool,
    pub status_applied: bool,
    pub posts_marked: bool,
    pub reports_resolved: bool,
    pub notified: bool,
    pub status: CascadeStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a completed cascade.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub user: User,
    pub banned: bool,
    pub resolved_reports: usize,
}

/// Issue a warning to a user and run the full cascade: bump the warning
/// counter, re-evaluate the user's status against the ban threshold, mark the
/// affected post(s), resolve their reports and notify the user.
pub async fn warn_user<G: Gateway>(
    gateway: &G,
    config: &AdminConfig,
    user_id: &str,
    trigger: CascadeTrigger,
    now: DateTime<Utc>,
) -> Result<CascadeOutcome> {
    let log = CascadeLog {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_owned(),
        trigger,
        post_ids: Vec::new(),
        warning_incremented: false,
        status_applied: false,
        posts_marked: false,
        reports_resolved: false,
        notified: false,
        status: CascadeStatus::Running,
        started_at: now,
        updated_at: now,
    };
    gateway
        .create(CASCADE_LOG_COLLECTION, serde_json::to_value(&log)?)
        .await
        .context("failed to journal cascade start")?;

    run(gateway, config, log, now).await
}

/// Re-run a half-applied cascade. Completed steps are skipped via the log
/// flags; the rest apply with the same state checks as a first run.
pub async fn resume_cascade<G: Gateway>(
    gateway: &G,
    config: &AdminConfig,
    log_id: &str,
    now: DateTime<Utc>,
) -> Result<CascadeOutcome> {
    let mut log: CascadeLog = fetch_one_as(gateway, CASCADE_LOG_COLLECTION, log_id)
        .await
        .context("cascade log not found")?;

    counter!(MOD_CASCADES_RESUMED).increment(1);
    info!(cascade = log_id, user = %log.user_id, "resuming cascade");

    log.status = CascadeStatus::Running;
    run(gateway, config, log, now).await
}

async fn run<G: Gateway>(
    gateway: &G,
    config: &AdminConfig,
    mut log: CascadeLog,
    now: DateTime<Utc>,
) -> Result<CascadeOutcome> {
    match run_steps(gateway, config, &mut log, now).await {
        Ok(outcome) => {
            log.status = CascadeStatus::Completed;
            persist(gateway, &mut log, now).await?;
            Ok(outcome)
        }
        Err(err) => {
            log.status = CascadeStatus::Failed;
            if let Err(persist_err) = persist(gateway, &mut log, now).await {
                warn!("failed to record cascade failure: {persist_err:?}");
            }
            Err(err)
        }
    }
}

async fn run_steps<G: Gateway>(
    gateway: &G,
    config: &AdminConfig,
    log: &mut CascadeLog,
    now: DateTime<Utc>,
) -> Result<CascadeOutcome> {
    // Step 1: bump the warning counter. Guarded by the log flag, not by a
    // state check, since the counter itself can't tell us whether we already ran.
    if !log.warning_incremented {
        gateway
            .increment_field(USER_COLLECTION, &log.user_id, "warningCount", 1)
            .await
            .context("failed to increment warning count")?;
        counter!(MOD_WARNINGS).increment(1);
        log.warning_incremented = true;
        persist(gateway, log, now).await?;
    }

    // Step 2: fresh read. Status is decided against the current counter, not
    // whatever the caller saw before the increment.
    let doc = gateway
        .fetch_by_id(USER_COLLECTION, &log.user_id)
        .await?
        .with_context(|| format!("user {} not found", log.user_id))?;
    let mut user: User = doc.decode()?;

    // Step 3: threshold evaluation. The revision check makes a concurrent
    // moderation of the same user fail here instead of overwriting it.
    if !log.status_applied {
        if user.warning_count >= config.ban_threshold && user.status != UserStatus::Banned {
            let until = now + Duration::days(config.ban_duration_days);
            gateway
                .update(
                    USER_COLLECTION,
                    &log.user_id,
                    json!({"status": "banned", "bannedUntil": until}),
                    Some(doc.rev),
                )
                .await
                .context("failed to ban user")?;
            user.status = UserStatus::Banned;
            user.banned_until = Some(until);
            counter!(MOD_BANS).increment(1);
            info!(user = %log.user_id, count = user.warning_count, "warning threshold reached, user banned");
        } else if user.status != UserStatus::Banned {
            gateway
                .update(
                    USER_COLLECTION,
                    &log.user_id,
                    json!({"status": "warning"}),
                    Some(doc.rev),
                )
                .await
                .context("failed to set warning status")?;
            user.status = UserStatus::Warning;
        }
        log.status_applied = true;
        persist(gateway, log, now).await?;
    }

    // Step 4: mark the affected post(s). Post/report context removes the one
    // post; user context flags every non-removed post the user has.
    if !log.posts_marked {
        match log.trigger.clone() {
            CascadeTrigger::User => {
                let posts: Vec<Post> = fetch_all_as(
                    gateway,
                    POST_COLLECTION,
                    &[Filter::eq("userId", log.user_id.clone())],
                )
                .await?;

                let mut ids = Vec::new();
                for post in posts.iter().filter(|p| p.status != PostStatus::Removed) {
                    if !post.is_warned {
                        gateway
                            .update(POST_COLLECTION, &post.id, json!({"isWarned": true}), None)
                            .await
                            .with_context(|| format!("failed to mark post {}", post.id))?;
                    }
                    ids.push(post.id.clone());
                }
                log.post_ids = ids;
            }
            CascadeTrigger::Post { post_id } | CascadeTrigger::Report { post_id, .. } => {
                let post: Post = fetch_one_as(gateway, POST_COLLECTION, &post_id).await?;

                let mut patch = serde_json::Map::new();
                if !post.is_warned {
                    patch.insert("isWarned".to_owned(), json!(true));
                }
                if post.status != PostStatus::Removed {
                    patch.insert("status".to_owned(), json!("removed"));
                }
                if !patch.is_empty() {
                    gateway
                        .update(POST_COLLECTION, &post_id, patch.into(), None)
                        .await
                        .context("failed to remove warned post")?;
                }
                log.post_ids = vec![post_id];
            }
        }
        log.posts_marked = true;
        persist(gateway, log, now).await?;
    }

    // Step 5: resolve every pending report against the affected posts.
    let mut resolved = 0;
    if !log.reports_resolved {
        resolved = resolve_reports_by_post_ids(gateway, &log.post_ids).await?;
        log.reports_resolved = true;
        persist(gateway, log, now).await?;
    }

    // Step 6: tell the user.
    if !log.notified {
        let post_id = match &log.trigger {
            CascadeTrigger::User => None,
            CascadeTrigger::Post { post_id } | CascadeTrigger::Report { post_id, .. } => {
                Some(post_id.clone())
            }
        };
        let message = match post_id {
            Some(_) => "One of your posts violated the community guidelines and was removed. \
                        A warning has been added to your account."
                .to_owned(),
            None => "A warning has been added to your account for violating the community \
                     guidelines."
                .to_owned(),
        };
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: log.user_id.clone(),
            post_id,
            message,
            created_at: now,
            read: false,
        };
        gateway
            .create(NOTIFICATION_COLLECTION, serde_json::to_value(&notification)?)
            .await
            .context("failed to dispatch warning notification")?;
        log.notified = true;
    }

    Ok(CascadeOutcome {
        banned: user.status == UserStatus::Banned,
        user,
        resolved_reports: resolved,
    })
}

async fn persist<G: Gateway>(
    gateway: &G,
    log: &mut CascadeLog,
    now: DateTime<Utc>,
) -> Result<()> {
    log.updated_at = now;
    let id = log.id.clone();
    gateway
        .update(
            CASCADE_LOG_COLLECTION,
            &id,
            serde_json::to_value(&*log)?,
            None,
        )
        .await
        .context("failed to persist cascade log")?;
    Ok(())
}

/// Transition every pending report on a post to resolved. Best-effort bulk
/// update: a failure partway leaves the earlier reports resolved.
pub async fn resolve_reports_by_post_id<G: Gateway>(gateway: &G, post_id: &str) -> Result<usize> {
    let reports: Vec<Report> = fetch_all_as(
        gateway,
        REPORT_COLLECTION,
        &[Filter::eq("postId", post_id)],
    )
    .await?;

    let mut resolved = 0;
    for report in reports.iter().filter(|r| r.status == ReportStatus::Pending) {
        gateway
            .update(
                REPORT_COLLECTION,
                &report.id,
                json!({"status": "resolved"}),
                None,
            )
            .await
            .with_context(|| format!("failed to resolve report {}", report.id))?;
        resolved += 1;
    }

    if resolved > 0 {
        counter!(MOD_REPORTS_RESOLVED).increment(resolved as u64);
    }
    Ok(resolved)
}

/// Batched variant, used when warning a user cascades across all of their
/// posts.
pub async fn resolve_reports_by_post_ids<G: Gateway>(
    gateway: &G,
    post_ids: &[String],
) -> Result<usize> {
    let mut total = 0;
    for post_id in post_ids {
        total += resolve_reports_by_post_id(gateway, post_id).await?;
    }
    Ok(total)
}

/// Admin-confirmed ban/unban toggle. Banning applies the configured
/// duration; unbanning recomputes status from the warning count. No cascade
/// to posts or reports.
pub async fn set_ban<G: Gateway>(
    gateway: &G,
    config: &AdminConfig,
    user_id: &str,
    banned: bool,
    now: DateTime<Utc>,
) -> Result<User> {
    let doc = gateway
        .fetch_by_id(USER_COLLECTION, user_id)
        .await?
        .with_context(|| format!("user {user_id} not found"))?;
    let user: User = doc.decode()?;

    let patch = if banned {
        counter!(MOD_BANS).increment(1);
        json!({
            "status": "banned",
            "bannedUntil": now + Duration::days(config.ban_duration_days),
        })
    } else {
        let status = if user.warning_count > 0 {
            "warning"
        } else {
            "active"
        };
        // Null drops the bannedUntil key from the document.
        json!({"status": status, "bannedUntil": null})
    };

    gateway
        .update(USER_COLLECTION, user_id, patch, Some(doc.rev))
        .await
        .context("failed to toggle ban status")?;

    Ok(fetch_one_as(gateway, USER_COLLECTION, user_id).await?)
}

/// Report-context variant of the toggle: suspended ↔ active.
pub async fn set_suspended<G: Gateway>(
    gateway: &G,
    user_id: &str,
    suspended: bool,
) -> Result<User> {
    let status = if suspended { "suspended" } else { "active" };
    gateway
        .update(USER_COLLECTION, user_id, json!({"status": status}), None)
        .await
        .context("failed to toggle suspension")?;

    Ok(fetch_one_as(gateway, USER_COLLECTION, user_id).await?)
}
