pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;
use crate::taxonomy::handlers::handle_get_taxonomy;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/taxonomy", get(handle_get_taxonomy))
        // Interview API
        .route(
            "/api/v1/interviews",
            post(handlers::handle_start_interview),
        )
        .route(
            "/api/v1/interviews/:thread_id",
            get(handlers::handle_get_interview),
        )
        .route(
            "/api/v1/interviews/:thread_id/responses",
            post(handlers::handle_respond),
        )
        .route(
            "/api/v1/interviews/:thread_id/retry",
            post(handlers::handle_retry),
        )
        .with_state(state)
}
