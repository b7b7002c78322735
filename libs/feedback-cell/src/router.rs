// libs/feedback-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use shared_config::AppConfig;

use crate::handlers;

pub fn feedback_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_ratings))
        .route("/score", post(handlers::score_feedback))
        .route("/summary", get(handlers::get_feedback_summary))
        .route(
            "/appointments/{appointment_id}",
            get(handlers::get_appointment_rating).post(handlers::submit_rating),
        )
        .with_state(state)
}
