// libs/feedback-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{FeedbackError, FeedbackQuery, ScoreFeedbackRequest, SubmitRatingRequest};
use crate::services::analytics::FeedbackAnalyticsService;
use crate::services::feedback::FeedbackService;

fn to_app_error(error: FeedbackError) -> AppError {
    match error {
        FeedbackError::NotFound => AppError::NotFound("No rating for this appointment".to_string()),
        FeedbackError::AppointmentNotFound => AppError::NotFound("Appointment not found".to_string()),
        FeedbackError::AppointmentNotCompleted => {
            AppError::BadRequest("Only completed appointments can be rated".to_string())
        },
        FeedbackError::AlreadyRated => AppError::Conflict("Appointment has already been rated".to_string()),
        FeedbackError::ValidationError(msg) => AppError::ValidationError(msg),
        FeedbackError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn score_feedback(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<ScoreFeedbackRequest>,
) -> Result<Json<Value>, AppError> {
    let feedback_service = FeedbackService::new(&state);

    let score = feedback_service.preview_score(request.rating, request.comment.as_deref())
        .map_err(to_app_error)?;

    Ok(Json(json!(score)))
}

#[axum::debug_handler]
pub async fn submit_rating(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<SubmitRatingRequest>,
) -> Result<Json<Value>, AppError> {
    let feedback_service = FeedbackService::new(&state);

    let rating = feedback_service.submit_rating(appointment_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "rating": rating,
        "message": "Thank you for your feedback"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_rating(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let feedback_service = FeedbackService::new(&state);

    let rating = feedback_service.get_rating_for_appointment(appointment_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(rating)))
}

#[axum::debug_handler]
pub async fn list_ratings(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<Value>, AppError> {
    let feedback_service = FeedbackService::new(&state);

    let ratings = feedback_service.list_ratings(&query, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "ratings": ratings,
        "total": ratings.len()
    })))
}

#[axum::debug_handler]
pub async fn get_feedback_summary(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<Value>, AppError> {
    let analytics_service = FeedbackAnalyticsService::new(&state);

    let summary = analytics_service.get_summary(&query, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(summary)))
}
