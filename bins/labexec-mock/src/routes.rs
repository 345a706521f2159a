use axum::routing::{get, post};
use axum::Router;
use labexec_common::endpoints;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(endpoints::HEALTH, get(handlers::health_check))
        .route(endpoints::LANGUAGES, get(handlers::list_languages))
        .route(endpoints::EXECUTE, post(handlers::submit_job))
        .route(endpoints::STATUS_ROUTE, get(handlers::get_job_status))
}
