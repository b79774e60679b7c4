//! Pure status derivation from time fields.
//!
//! Stored status can go stale between sweeps, so every display or comparison
//! path derives the effective status from the entity's time fields through
//! these functions instead of trusting the stored value.

use chrono::{DateTime, Duration, Utc};

use crate::admin_config::AdminConfig;
use crate::models::{
    Announcement, AnnouncementStatus, ArSpawn, Post, PostStatus, SpawnStatus,
};

/// Effective status of a post at `now`. `Removed` is terminal; an active
/// post older than the configured visibility window reads as expired even
/// before a sweep has persisted that.
pub fn derive_post_status(post: &Post, config: &AdminConfig, now: DateTime<Utc>) -> PostStatus {
    match post.status {
        PostStatus::Removed => PostStatus::Removed,
        PostStatus::Expired => PostStatus::Expired,
        PostStatus::Active => {
            if now - post.post_date > Duration::hours(config.post_visibility_duration) {
                PostStatus::Expired
            } else {
                PostStatus::Active
            }
        }
    }
}

/// Effective status of an announcement at `now`. Pending (awaiting approval)
/// and removed are sticky; everything else follows the date window.
pub fn derive_announcement_status(ann: &Announcement, now: DateTime<Utc>) -> AnnouncementStatus {
    match ann.status {
        AnnouncementStatus::Removed => AnnouncementStatus::Removed,
        AnnouncementStatus::Pending => AnnouncementStatus::Pending,
        _ => {
            if now < ann.start_date {
                AnnouncementStatus::Scheduled
            } else if now > ann.end_date {
                AnnouncementStatus::Expired
            } else {
                AnnouncementStatus::Active
            }
        }
    }
}

/// Effective status of an AR spawn at `now`: scheduled before `start_time`,
/// inactive after `end_time`, active in between. Spawns with no time window
/// keep their stored status.
pub fn derive_spawn_status(spawn: &ArSpawn, now: DateTime<Utc>) -> SpawnStatus {
    if let Some(start) = spawn.start_time {
        if now < start {
            return SpawnStatus::Scheduled;
        }
    }
    if let Some(end) = spawn.end_time {
        if now > end {
            return SpawnStatus::Inactive;
        }
    }
    if spawn.start_time.is_some() || spawn.end_time.is_some() {
        SpawnStatus::Active
    } else {
        spawn.status
    }
}

/// Whether an announcement belongs in the bell's urgent feed: still pending
/// or scheduled, with a start date inside (now, now + threshold hours].
pub fn announcement_in_urgent_window(
    ann: &Announcement,
    config: &AdminConfig,
    now: DateTime<Utc>,
) -> bool {
    if !matches!(
        ann.status,
        AnnouncementStatus::Pending | AnnouncementStatus::Scheduled
    ) {
        return false;
    }
    ann.start_date > now
        && ann.start_date <= now + Duration::hours(config.urgent_announcement_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rarity, SpawnGeometry};

    fn test_post(age_hours: i64, status: PostStatus, now: DateTime<Utc>) -> Post {
        Post {
            id: "p1".to_owned(),
            content: "hello".to_owned(),
            user_id: "u1".to_owned(),
            user_name: "someone".to_owned(),
            post_date: now - Duration::hours(age_hours),
            category: "general".to_owned(),
            location: None,
            likes: 0,
            dislikes: 0,
            report_count: 0,
            status,
            is_warned: false,
        }
    }

    fn test_announcement(
        status: AnnouncementStatus,
        start_in_hours: i64,
        now: DateTime<Utc>,
    ) -> Announcement {
        Announcement {
            id: "a1".to_owned(),
            title: "title".to_owned(),
            body: "body".to_owned(),
            department: "engineering".to_owned(),
            status,
            start_date: now + Duration::hours(start_in_hours),
            end_date: now + Duration::hours(start_in_hours + 24),
            created_by_uid: "u1".to_owned(),
            announcer_id: None,
            is_urgent: false,
            photo_paths: vec![],
            view_count: 0,
            click_count: 0,
        }
    }

    fn test_spawn(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        stored: SpawnStatus,
    ) -> ArSpawn {
        ArSpawn {
            id: "s1".to_owned(),
            name: "Mascot".to_owned(),
            slug: "mascot".to_owned(),
            category: "mascots".to_owned(),
            rarity: Rarity::Rare,
            catchable_count: 10,
            geometry: SpawnGeometry::Point { lat: 0.0, lng: 0.0 },
            catch_radius_m: 15.0,
            reveal_radius_m: 100.0,
            point: 50,
            coin_value: 5,
            start_time: start,
            end_time: end,
            status: stored,
        }
    }

    #[test]
    fn post_expires_past_visibility_window() {
        let now = Utc::now();
        let config = AdminConfig::default(); // 24h window

        let fresh = test_post(23, PostStatus::Active, now);
        assert_eq!(derive_post_status(&fresh, &config, now), PostStatus::Active);

        let stale = test_post(25, PostStatus::Active, now);
        assert_eq!(derive_post_status(&stale, &config, now), PostStatus::Expired);

        let removed = test_post(25, PostStatus::Removed, now);
        assert_eq!(derive_post_status(&removed, &config, now), PostStatus::Removed);
    }

    #[test]
    fn post_at_exact_boundary_stays_active() {
        let now = Utc::now();
        let config = AdminConfig::default();
        let boundary = test_post(24, PostStatus::Active, now);
        assert_eq!(derive_post_status(&boundary, &config, now), PostStatus::Active);
    }

    #[test]
    fn announcement_follows_date_window() {
        let now = Utc::now();

        let upcoming = test_announcement(AnnouncementStatus::Scheduled, 2, now);
        assert_eq!(
            derive_announcement_status(&upcoming, now),
            AnnouncementStatus::Scheduled
        );

        let live = test_announcement(AnnouncementStatus::Scheduled, -2, now);
        assert_eq!(
            derive_announcement_status(&live, now),
            AnnouncementStatus::Active
        );

        let over = test_announcement(AnnouncementStatus::Active, -48, now);
        assert_eq!(
            derive_announcement_status(&over, now),
            AnnouncementStatus::Expired
        );

        let pending = test_announcement(AnnouncementStatus::Pending, 2, now);
        assert_eq!(
            derive_announcement_status(&pending, now),
            AnnouncementStatus::Pending
        );
    }

    #[test]
    fn spawn_status_derivation() {
        let now = Utc::now();

        let upcoming = test_spawn(Some(now + Duration::hours(1)), None, SpawnStatus::Active);
        assert_eq!(derive_spawn_status(&upcoming, now), SpawnStatus::Scheduled);

        let over = test_spawn(
            Some(now - Duration::hours(3)),
            Some(now - Duration::hours(1)),
            SpawnStatus::Active,
        );
        assert_eq!(derive_spawn_status(&over, now), SpawnStatus::Inactive);

        let live = test_spawn(
            Some(now - Duration::hours(1)),
            Some(now + Duration::hours(1)),
            SpawnStatus::Scheduled,
        );
        assert_eq!(derive_spawn_status(&live, now), SpawnStatus::Active);

        let untimed = test_spawn(None, None, SpawnStatus::Inactive);
        assert_eq!(derive_spawn_status(&untimed, now), SpawnStatus::Inactive);
    }

    #[test]
    fn urgent_window_membership() {
        let now = Utc::now();
        let config = AdminConfig::default(); // 48h window

        assert!(announcement_in_urgent_window(
            &test_announcement(AnnouncementStatus::Scheduled, 2, now),
            &config,
            now
        ));
        assert!(announcement_in_urgent_window(
            &test_announcement(AnnouncementStatus::Pending, 48, now),
            &config,
            now
        ));
        // Too far out.
        assert!(!announcement_in_urgent_window(
            &test_announcement(AnnouncementStatus::Scheduled, 49, now),
            &config,
            now
        ));
        // Already started.
        assert!(!announcement_in_urgent_window(
            &test_announcement(AnnouncementStatus::Scheduled, -1, now),
            &config,
            now
        ));
        // Wrong status.
        assert!(!announcement_in_urgent_window(
            &test_announcement(AnnouncementStatus::Active, 2, now),
            &config,
            now
        ));
    }
}
