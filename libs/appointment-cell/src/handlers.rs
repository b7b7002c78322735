// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use serde::Deserialize;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    BookAppointmentRequest, UpdateAppointmentRequest, RescheduleAppointmentRequest,
    CancelAppointmentRequest, AppointmentSearchQuery, AppointmentStatus,
    ConflictCheckRequest, AppointmentError,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub client_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub service_type_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl From<AppointmentQueryParams> for AppointmentSearchQuery {
    fn from(params: AppointmentQueryParams) -> Self {
        Self {
            client_id: params.client_id,
            staff_id: params.staff_id,
            status: params.status,
            service_type_id: params.service_type_id,
            from_date: params.from_date,
            to_date: params.to_date,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub staff_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingAppointmentsQuery {
    pub client_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub hours_ahead: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkConflictCheckRequest {
    pub checks: Vec<ConflictCheckRequest>,
}

fn to_app_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::ConflictDetected => {
            AppError::Conflict("Appointment slot conflicts with existing booking".to_string())
        },
        AppointmentError::DailyLimitReached { limit } => {
            AppError::Conflict(format!("Daily appointment limit of {} reached", limit))
        },
        AppointmentError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!("Cannot transition from current status: {}", status))
        },
        AppointmentError::InvalidTime(msg) => AppError::BadRequest(msg),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.book_appointment(request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.get_appointment(appointment_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let updated_appointment = booking_service.update_appointment(appointment_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated_appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.reschedule_appointment(appointment_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.cancel_appointment(appointment_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service.search_appointments(params.into(), auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<UpcomingAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service.get_upcoming_appointments(
        query.client_id,
        query.staff_id,
        query.hours_ahead,
        auth.token(),
    ).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let stats = booking_service.get_appointment_stats(params.into(), auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(stats)))
}

// ==============================================================================
// CONFLICT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let response = booking_service.check_conflicts(
        query.staff_id,
        query.start_time,
        query.end_time,
        query.exclude_appointment_id,
        auth.token(),
    ).await.map_err(to_app_error)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn bulk_check_appointment_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BulkConflictCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let results = booking_service.bulk_conflict_check(request.checks, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "results": results,
        "any_conflict": results.iter().any(|r| r.has_conflict)
    })))
}
