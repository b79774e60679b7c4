//! The post auto-expiry sweep.
//!
//! Runs opportunistically when the admin post table is loaded, never as a
//! background job. Best-effort: a write failure on one post is logged and
//! the sweep moves on, since expiry is informational and the next load will
//! pick the post up again.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::json;
use tracing::{debug, warn};

use crate::admin_config::AdminConfig;
use crate::gateway::{fetch_all_as, Gateway};
use crate::metrics::MOD_POSTS_EXPIRED;
use crate::models::{Post, PostStatus, POST_COLLECTION};
use crate::moderation::lifecycle::derive_post_status;

/// Expire every active post that has outlived the configured visibility
/// window. Returns how many posts were transitioned.
pub async fn sweep_expired_posts<G: Gateway>(
    gateway: &G,
    config: &AdminConfig,
    now: DateTime<Utc>,
) -> Result<usize> {
    let posts: Vec<Post> = fetch_all_as(gateway, POST_COLLECTION, &[]).await?;

    let mut expired = 0;
    for post in &posts {
        if post.status != PostStatus::Active {
            continue;
        }
        if derive_post_status(post, config, now) != PostStatus::Expired {
            continue;
        }

        match gateway
            .update(POST_COLLECTION, &post.id, json!({"status": "expired"}), None)
            .await
        {
            Ok(()) => expired += 1,
            Err(err) => warn!(post = %post.id, "failed to expire post: {err}"),
        }
    }

    if expired > 0 {
        counter!(MOD_POSTS_EXPIRED).increment(expired as u64);
        debug!(count = expired, "expired stale posts");
    }
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;
    use crate::gateway::fetch_one_as;
    use chrono::Duration;

    fn seed_post(gw: &MemoryGateway, id: &str, age_hours: i64, status: PostStatus) {
        let post = Post {
            id: id.to_owned(),
            content: "a post".to_owned(),
            user_id: "u1".to_owned(),
            user_name: "Test User".to_owned(),
            post_date: Utc::now() - Duration::hours(age_hours),
            category: "general".to_owned(),
            location: None,
            likes: 0,
            dislikes: 0,
            report_count: 0,
            status,
            is_warned: false,
        };
        gw.seed(POST_COLLECTION, id, serde_json::to_value(post).unwrap());
    }

    #[tokio::test]
    async fn sweep_expires_only_stale_active_posts() -> Result<()> {
        let gw = MemoryGateway::new();
        let config = AdminConfig::default(); // 24h visibility

        seed_post(&gw, "stale", 25, PostStatus::Active);
        seed_post(&gw, "fresh", 23, PostStatus::Active);
        seed_post(&gw, "removed", 48, PostStatus::Removed);

        let count = sweep_expired_posts(&gw, &config, Utc::now()).await?;
        assert_eq!(count, 1);

        let stale: Post = fetch_one_as(&gw, POST_COLLECTION, "stale").await?;
        let fresh: Post = fetch_one_as(&gw, POST_COLLECTION, "fresh").await?;
        let removed: Post = fetch_one_as(&gw, POST_COLLECTION, "removed").await?;
        assert_eq!(stale.status, PostStatus::Expired);
        assert_eq!(fresh.status, PostStatus::Active);
        assert_eq!(removed.status, PostStatus::Removed);

        // A second sweep finds nothing to do.
        assert_eq!(sweep_expired_posts(&gw, &config, Utc::now()).await?, 0);
        Ok(())
    }
}
