// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch},
};

use shared_config::AppConfig;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/search", get(handlers::search_appointments))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/stats", get(handlers::get_appointment_stats))
        .route("/conflicts/check", get(handlers::check_appointment_conflicts))
        .route("/conflicts/bulk", post(handlers::bulk_check_appointment_conflicts))
        .route("/{appointment_id}", get(handlers::get_appointment).put(handlers::update_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .with_state(state)
}
