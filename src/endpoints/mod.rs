use axum::Router;

use crate::AppState;

mod announcements;
mod announcers;
mod bell;
mod cascades;
mod config;
mod posts;
mod reports;
mod spawns;
mod users;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(users::routes())
        .merge(posts::routes())
        .merge(reports::routes())
        .merge(announcements::routes())
        .merge(announcers::routes())
        .merge(spawns::routes())
        .merge(config::routes())
        .merge(cascades::routes())
        .merge(bell::routes())
}
