//! Notification-bell aggregation.
//!
//! Read-side only: combines urgently-reported posts and upcoming urgent
//! announcements into the badge count the dashboard bell shows. Recomputed
//! from fresh snapshots on every underlying change; nothing here writes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::admin_config::AdminConfig;
use crate::models::{Announcement, Post, PostStatus};
use crate::moderation::lifecycle::{announcement_in_urgent_window, derive_post_status};
use crate::moderation::severity::is_urgent;

/// The bell badge: which posts and announcements currently demand attention.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UrgentSummary {
    pub urgent_post_ids: Vec<String>,
    pub upcoming_announcement_ids: Vec<String>,
    pub total: usize,
}

/// Compute the bell badge from entity snapshots. A post counts if its report
/// count meets the urgent threshold and its derived status is not terminal;
/// an announcement counts if it sits inside the upcoming-urgency window.
pub fn urgent_summary(
    posts: &[Post],
    announcements: &[Announcement],
    config: &AdminConfig,
    now: DateTime<Utc>,
) -> UrgentSummary {
    let urgent_post_ids: Vec<String> = posts
        .iter()
        .filter(|p| is_urgent(p.report_count, &config.report_thresholds))
        .filter(|p| derive_post_status(p, config, now) == PostStatus::Active)
        .map(|p| p.id.clone())
        .collect();

    let upcoming_announcement_ids: Vec<String> = announcements
        .iter()
        .filter(|a| announcement_in_urgent_window(a, config, now))
        .map(|a| a.id.clone())
        .collect();

    let total = urgent_post_ids.len() + upcoming_announcement_ids.len();
    UrgentSummary {
        urgent_post_ids,
        upcoming_announcement_ids,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnnouncementStatus;
    use chrono::Duration;

    fn post(id: &str, report_count: i64, age_hours: i64, status: PostStatus) -> Post {
        Post {
            id: id.to_owned(),
            content: "a post".to_owned(),
            user_id: "u1".to_owned(),
            user_name: "Test User".to_owned(),
            post_date: Utc::now() - Duration::hours(age_hours),
            category: "general".to_owned(),
            location: None,
            likes: 0,
            dislikes: 0,
            report_count,
            status,
            is_warned: false,
        }
    }

    fn announcement(id: &str, status: AnnouncementStatus, start_in_hours: i64) -> Announcement {
        let now = Utc::now();
        Announcement {
            id: id.to_owned(),
            title: "title".to_owned(),
            body: "body".to_owned(),
            department: "engineering".to_owned(),
            status,
            start_date: now + Duration::hours(start_in_hours),
            end_date: now + Duration::hours(start_in_hours + 24),
            created_by_uid: "u1".to_owned(),
            announcer_id: None,
            is_urgent: true,
            photo_paths: vec![],
            view_count: 0,
            click_count: 0,
        }
    }

    #[test]
    fn badge_counts_urgent_posts_and_upcoming_announcements() {
        let config = AdminConfig::default(); // urgent at 10 reports, 48h window
        let now = Utc::now();

        let posts = vec![
            post("p1", 10, 1, PostStatus::Active),   // urgent
            post("p2", 9, 1, PostStatus::Active),    // below threshold
            post("p3", 25, 1, PostStatus::Removed),  // terminal
            post("p4", 12, 30, PostStatus::Active),  // derives expired
        ];
        let announcements = vec![
            announcement("a1", AnnouncementStatus::Scheduled, 2), // in window
            announcement("a2", AnnouncementStatus::Pending, 100), // too far out
            announcement("a3", AnnouncementStatus::Active, -1),   // already live
        ];

        let summary = urgent_summary(&posts, &announcements, &config, now);
        assert_eq!(summary.urgent_post_ids, vec!["p1".to_owned()]);
        assert_eq!(summary.upcoming_announcement_ids, vec!["a1".to_owned()]);
        assert_eq!(summary.total, 2);
    }
}
