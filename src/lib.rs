//! Moderation/administration backend for the campus app dashboard.
mod admin_config;
mod auth;
mod bell;
mod config;
mod endpoints;
pub mod error;
mod gateway;
mod metrics;
mod models;
mod moderation;
mod serve;
mod storage;
#[cfg(test)]
mod tests;

pub use serve::run;
pub(crate) use serve::{AppState, Result};
pub(crate) use error::Error;

/// The index (/) route.
async fn index() -> impl axum::response::IntoResponse {
    r"
                                                       _
  ___ __ _ _ __ ___  _ __  _   _ ___ _ __ ___   ___   __| |
 / __/ _` | '_ ` _ \| '_ \| | | / __| '_ ` _ \ / _ \ / _` |
| (_| (_| | | | | | | |_) | |_| \__ \ | | | | | (_) | (_| |
 \___\__,_|_| |_| |_| .__/ \__,_|___/_| |_| |_|\___/ \__,_|
                    |_|


This is the moderation backend for the campus app admin dashboard.

Admin API routes are under /admin/
Stored media is served under /media/
    "
}
