//! Metric name constants.

use std::time::Duration;

use anyhow::Context;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config;

pub const AUTH_FAILED: &str = "campusmod.auth.failed"; // Counter.

pub const MOD_WARNINGS: &str = "campusmod.moderation.warnings"; // Counter.
pub const MOD_BANS: &str = "campusmod.moderation.bans"; // Counter.
pub const MOD_REPORTS_RESOLVED: &str = "campusmod.moderation.reports_resolved"; // Counter.
pub const MOD_POSTS_EXPIRED: &str = "campusmod.moderation.posts_expired"; // Counter.
pub const MOD_CASCADES_RESUMED: &str = "campusmod.moderation.cascades_resumed"; // Counter.

pub const BELL_LISTENERS: &str = "campusmod.bell.listeners"; // Gauge.
pub const BELL_UPDATES: &str = "campusmod.bell.updates"; // Counter.

/// Must be ran exactly once on startup. This will declare all of the instruments for `metrics`.
pub fn setup(config: &Option<config::MetricConfig>) -> anyhow::Result<()> {
    describe_counter!(AUTH_FAILED, "The number of failed authentication attempts.");

    describe_counter!(MOD_WARNINGS, "Warnings issued to users.");
    describe_counter!(MOD_BANS, "Users banned by threshold or toggle.");
    describe_counter!(
        MOD_REPORTS_RESOLVED,
        "Reports resolved by moderation cascades or admin action."
    );
    describe_counter!(MOD_POSTS_EXPIRED, "Posts expired by the auto-expiry sweep.");
    describe_counter!(
        MOD_CASCADES_RESUMED,
        "Half-applied moderation cascades resumed by an admin."
    );

    describe_gauge!(
        BELL_LISTENERS,
        "The number of active consumers on the notification bell feed."
    );
    describe_counter!(
        BELL_UPDATES,
        "Urgent-summary updates broadcast to bell listeners."
    );

    if let Some(config) = config {
        match config {
            config::MetricConfig::PrometheusPush(prometheus_config) => {
                PrometheusBuilder::new()
                    .with_push_gateway(
                        prometheus_config.url.clone(),
                        Duration::from_secs(10),
                        None,
                        None,
                    )
                    .context("failed to set up push gateway")?
                    .install()
                    .context("failed to install metrics exporter")?;
            }
        }
    }

    Ok(())
}
