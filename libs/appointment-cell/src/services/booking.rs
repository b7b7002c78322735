// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Timelike, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::{is_conflict, SupabaseClient};

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, UpdateAppointmentRequest,
    RescheduleAppointmentRequest, CancelAppointmentRequest, AppointmentSearchQuery,
    AppointmentStats, AppointmentError, AppointmentValidationRules, ConflictCheckRequest,
    ConflictCheckResponse, TimeInterval,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    validation_rules: AppointmentValidationRules,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let validation_rules = AppointmentValidationRules {
            max_appointments_per_day: config.max_daily_appointments,
            ..AppointmentValidationRules::default()
        };
        Self::with_rules(config, validation_rules)
    }

    pub fn with_rules(config: &AppConfig, validation_rules: AppointmentValidationRules) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let conflict_service = ConflictDetectionService::with_suggestions(
            Arc::clone(&supabase),
            validation_rules.suggestion_step_minutes,
            validation_rules.max_suggestions,
        );

        Self {
            supabase,
            conflict_service,
            lifecycle_service: AppointmentLifecycleService::new(),
            validation_rules,
        }
    }

    /// Book a new appointment after validating its interval and checking the calendar
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for client {} with staff {}",
              request.client_id, request.staff_id);

        let interval = TimeInterval::new(request.start_time, request.end_time)?;
        self.validate_interval(&interval, Utc::now())?;

        self.check_client_daily_limit(request.client_id, interval.start, None, auth_token).await?;

        let conflict_check = self.conflict_service.check_conflicts(
            request.staff_id,
            interval.start,
            interval.end,
            None,
            auth_token,
        ).await?;

        if conflict_check.has_conflict {
            warn!("Booking rejected for staff {} at {}: slot taken",
                  request.staff_id, interval.start);
            return Err(AppointmentError::ConflictDetected);
        }

        let appointment = self.create_appointment_record(request, interval, auth_token).await?;

        info!("Appointment {} booked successfully with staff {}",
              appointment.id, appointment.staff_id);
        Ok(appointment)
    }

    /// Update status, notes or time of an existing appointment
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment: {}", appointment_id);

        let current_appointment = self.get_appointment(appointment_id, auth_token).await?;

        if let Some(new_status) = &request.status {
            self.lifecycle_service.validate_status_transition(
                &current_appointment.status,
                new_status,
            )?;
        }

        let new_interval = match (request.start_time, request.end_time) {
            (None, None) => None,
            (start, end) => {
                self.lifecycle_service.can_reschedule(&current_appointment.status)?;

                let interval = TimeInterval::new(
                    start.unwrap_or(current_appointment.start_time),
                    end.unwrap_or(current_appointment.end_time),
                )?;
                self.validate_interval(&interval, Utc::now())?;

                if interval.start.date_naive() != current_appointment.start_time.date_naive() {
                    self.check_client_daily_limit(
                        current_appointment.client_id,
                        interval.start,
                        Some(appointment_id),
                        auth_token,
                    ).await?;
                }

                // The appointment being moved must not collide with itself
                let conflict_check = self.conflict_service.check_conflicts(
                    current_appointment.staff_id,
                    interval.start,
                    interval.end,
                    Some(appointment_id),
                    auth_token,
                ).await?;

                if conflict_check.has_conflict {
                    warn!("Update of appointment {} rejected: new time conflicts", appointment_id);
                    return Err(AppointmentError::ConflictDetected);
                }

                Some(interval)
            }
        };

        let updated_appointment = self.update_appointment_record(
            appointment_id,
            &request,
            new_interval,
            auth_token,
        ).await?;

        info!("Appointment {} updated successfully", appointment_id);
        Ok(updated_appointment)
    }

    /// Move an appointment to a new interval
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment: {}", appointment_id);

        let update_request = UpdateAppointmentRequest {
            status: None,
            notes: request.reason.map(|reason| format!("Rescheduled: {}", reason)),
            start_time: Some(request.new_start_time),
            end_time: Some(request.new_end_time),
        };

        self.update_appointment(appointment_id, update_request, auth_token).await
    }

    /// Cancel an appointment, freeing its slot
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        if request.reason.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Cancellation reason is required".to_string()));
        }

        let cancellation_note = format!("Cancelled by {:?}: {}", request.cancelled_by, request.reason);

        let update_request = UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Cancelled),
            notes: Some(cancellation_note),
            start_time: None,
            end_time: None,
        };

        let cancelled_appointment = self.update_appointment(appointment_id, update_request, auth_token).await?;

        info!("Appointment {} cancelled successfully", appointment_id);
        Ok(cancelled_appointment)
    }

    /// Get appointment by ID
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Search appointments with filters
    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with filters: {:?}", query);

        let path = build_search_path(&query);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    /// Active appointments starting within the next `hours_ahead` hours (default 24)
    pub async fn get_upcoming_appointments(
        &self,
        client_id: Option<Uuid>,
        staff_id: Option<Uuid>,
        hours_ahead: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let now = Utc::now();
        // PostgreSQL rejects nanosecond precision in filters
        let rounded_now = now.with_nanosecond(0).unwrap_or(now);
        let future_time = rounded_now + ChronoDuration::hours(hours_ahead.unwrap_or(24) as i64);

        let query = AppointmentSearchQuery {
            client_id,
            staff_id,
            from_date: Some(rounded_now),
            to_date: Some(future_time),
            limit: Some(50),
            ..AppointmentSearchQuery::default()
        };

        let mut appointments = self.search_appointments(query, auth_token).await?;

        appointments.retain(|apt| matches!(apt.status,
            AppointmentStatus::Pending | AppointmentStatus::Scheduled
        ));

        Ok(appointments)
    }

    pub async fn get_appointment_stats(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<AppointmentStats, AppointmentError> {
        debug!("Calculating appointment statistics");

        let appointments = self.search_appointments(query, auth_token).await?;
        Ok(compute_stats(&appointments))
    }

    pub async fn check_conflicts(
        &self,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        self.conflict_service.check_conflicts(
            staff_id,
            start_time,
            end_time,
            exclude_appointment_id,
            auth_token,
        ).await
    }

    pub async fn bulk_conflict_check(
        &self,
        requests: Vec<ConflictCheckRequest>,
        auth_token: &str,
    ) -> Result<Vec<ConflictCheckResponse>, AppointmentError> {
        self.conflict_service.bulk_conflict_check(requests, auth_token).await
    }

    /// Link a submitted rating to its appointment
    pub async fn attach_rating(
        &self,
        appointment_id: Uuid,
        rating_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Attaching rating {} to appointment {}", rating_id, appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let body = json!({
            "rating_id": rating_id,
            "updated_at": Utc::now().to_rfc3339(),
        });

        self.write_single(Method::PATCH, &path, body, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn validate_interval(&self, interval: &TimeInterval, now: DateTime<Utc>) -> Result<(), AppointmentError> {
        if interval.start <= now {
            return Err(AppointmentError::InvalidTime("Appointment must start in the future".to_string()));
        }

        let minutes = interval.duration().num_minutes();
        if minutes < self.validation_rules.min_appointment_minutes {
            return Err(AppointmentError::InvalidTime(format!(
                "Appointment must last at least {} minutes",
                self.validation_rules.min_appointment_minutes
            )));
        }
        if minutes > self.validation_rules.max_appointment_minutes {
            return Err(AppointmentError::InvalidTime(format!(
                "Appointment cannot last longer than {} minutes",
                self.validation_rules.max_appointment_minutes
            )));
        }

        Ok(())
    }

    async fn check_client_daily_limit(
        &self,
        client_id: Uuid,
        start_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let limit = self.validation_rules.max_appointments_per_day;
        if limit == 0 {
            return Ok(());
        }

        let day_start = start_time.date_naive().and_time(NaiveTime::MIN).and_utc();
        let query = AppointmentSearchQuery {
            client_id: Some(client_id),
            from_date: Some(day_start),
            to_date: Some(day_start + ChronoDuration::days(1)),
            ..AppointmentSearchQuery::default()
        };

        let booked = self.search_appointments(query, auth_token).await?
            .iter()
            .filter(|apt| apt.is_active() && Some(apt.id) != exclude_appointment_id)
            // to_date is inclusive in storage; the next midnight belongs to tomorrow
            .filter(|apt| apt.start_time < day_start + ChronoDuration::days(1))
            .count() as u32;

        if booked >= limit {
            warn!("Client {} already has {} appointments on {}", client_id, booked, day_start.date_naive());
            return Err(AppointmentError::DailyLimitReached { limit });
        }

        Ok(())
    }

    async fn create_appointment_record(
        &self,
        request: BookAppointmentRequest,
        interval: TimeInterval,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "client_id": request.client_id,
            "staff_id": request.staff_id,
            "service_type_id": request.service_type_id,
            "start_time": interval.start.to_rfc3339(),
            "end_time": interval.end.to_rfc3339(),
            "status": AppointmentStatus::Pending,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now,
        });

        self.write_single(Method::POST, "/rest/v1/appointments", appointment_data, auth_token).await
    }

    async fn update_appointment_record(
        &self,
        appointment_id: Uuid,
        request: &UpdateAppointmentRequest,
        new_interval: Option<TimeInterval>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut update_data = serde_json::Map::new();

        if let Some(status) = &request.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(notes) = &request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(interval) = new_interval {
            update_data.insert("start_time".to_string(), json!(interval.start.to_rfc3339()));
            update_data.insert("end_time".to_string(), json!(interval.end.to_rfc3339()));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.write_single(Method::PATCH, &path, Value::Object(update_data), auth_token).await
    }

    /// POST/PATCH returning the written row; a storage-side 409 means the
    /// exclusion constraint caught a concurrent booking.
    async fn write_single(
        &self,
        method: Method,
        path: &str,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let result: Vec<Value> = self.supabase.request_with_headers(
            method,
            path,
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| {
            if is_conflict(&e) {
                warn!("Storage rejected overlapping appointment: {}", e);
                AppointmentError::ConflictDetected
            } else {
                AppointmentError::DatabaseError(e.to_string())
            }
        })?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}

fn build_search_path(query: &AppointmentSearchQuery) -> String {
    let mut query_parts = Vec::new();

    if let Some(client_id) = query.client_id {
        query_parts.push(format!("client_id=eq.{}", client_id));
    }
    if let Some(staff_id) = query.staff_id {
        query_parts.push(format!("staff_id=eq.{}", staff_id));
    }
    if let Some(status) = query.status {
        query_parts.push(format!("status=eq.{}", status));
    }
    if let Some(service_type_id) = query.service_type_id {
        query_parts.push(format!("service_type_id=eq.{}", service_type_id));
    }
    if let Some(from_date) = query.from_date {
        query_parts.push(format!("start_time=gte.{}", urlencoding::encode(&from_date.to_rfc3339())));
    }
    if let Some(to_date) = query.to_date {
        query_parts.push(format!("start_time=lte.{}", urlencoding::encode(&to_date.to_rfc3339())));
    }

    query_parts.push("order=start_time.desc".to_string());

    if let Some(limit) = query.limit {
        query_parts.push(format!("limit={}", limit));
    }
    if let Some(offset) = query.offset {
        query_parts.push(format!("offset={}", offset));
    }

    format!("/rest/v1/appointments?{}", query_parts.join("&"))
}

/// Status counts, mean duration of non-cancelled bookings and completion rate.
pub fn compute_stats(appointments: &[Appointment]) -> AppointmentStats {
    let count = |status: AppointmentStatus| {
        appointments.iter().filter(|apt| apt.status == status).count() as i32
    };

    let total_appointments = appointments.len() as i32;
    let completed_appointments = count(AppointmentStatus::Completed);

    let active: Vec<&Appointment> = appointments.iter().filter(|apt| apt.is_active()).collect();
    let average_duration_minutes = if active.is_empty() {
        0
    } else {
        active.iter().map(|apt| apt.duration_minutes()).sum::<i64>() / active.len() as i64
    };

    let completion_rate = if total_appointments > 0 {
        completed_appointments as f64 / total_appointments as f64
    } else {
        0.0
    };

    AppointmentStats {
        total_appointments,
        pending_appointments: count(AppointmentStatus::Pending),
        scheduled_appointments: count(AppointmentStatus::Scheduled),
        completed_appointments,
        cancelled_appointments: count(AppointmentStatus::Cancelled),
        average_duration_minutes,
        completion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2031, 3, 10, hour, minute, 0).unwrap()
    }

    fn appointment(start: DateTime<Utc>, end: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            service_type_id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            status,
            notes: None,
            rating_id: None,
            created_at: at(0, 0),
            updated_at: at(0, 0),
        }
    }

    fn create_test_booking_service() -> AppointmentBookingService {
        AppointmentBookingService::new(&AppConfig::default())
    }

    #[test]
    fn test_validate_interval_rules() {
        let service = create_test_booking_service();
        let now = at(8, 0);

        let ok = TimeInterval::new(at(9, 0), at(10, 0)).unwrap();
        assert!(service.validate_interval(&ok, now).is_ok());

        let past = TimeInterval::new(at(7, 0), at(7, 30)).unwrap();
        assert_matches!(service.validate_interval(&past, now), Err(AppointmentError::InvalidTime(_)));

        let too_short = TimeInterval::new(at(9, 0), at(9, 2)).unwrap();
        assert_matches!(service.validate_interval(&too_short, now), Err(AppointmentError::InvalidTime(_)));

        let too_long = TimeInterval::new(at(9, 0), at(18, 0)).unwrap();
        assert_matches!(service.validate_interval(&too_long, now), Err(AppointmentError::InvalidTime(_)));
    }

    #[test]
    fn test_compute_stats() {
        let appointments = vec![
            appointment(at(9, 0), at(10, 0), AppointmentStatus::Completed),
            appointment(at(10, 0), at(10, 30), AppointmentStatus::Scheduled),
            appointment(at(11, 0), at(11, 30), AppointmentStatus::Pending),
            appointment(at(12, 0), at(14, 0), AppointmentStatus::Cancelled),
        ];

        let stats = compute_stats(&appointments);
        assert_eq!(stats.total_appointments, 4);
        assert_eq!(stats.completed_appointments, 1);
        assert_eq!(stats.scheduled_appointments, 1);
        assert_eq!(stats.pending_appointments, 1);
        assert_eq!(stats.cancelled_appointments, 1);
        // (60 + 30 + 30) / 3, cancelled excluded
        assert_eq!(stats.average_duration_minutes, 40);
        assert!((stats.completion_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compute_stats_empty() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.total_appointments, 0);
        assert_eq!(stats.average_duration_minutes, 0);
        assert_eq!(stats.completion_rate, 0.0);
    }

    #[test]
    fn test_build_search_path_encodes_dates() {
        let query = AppointmentSearchQuery {
            status: Some(AppointmentStatus::Scheduled),
            from_date: Some(at(9, 0)),
            limit: Some(10),
            ..AppointmentSearchQuery::default()
        };

        let path = build_search_path(&query);
        assert!(path.starts_with("/rest/v1/appointments?status=eq.SCHEDULED"));
        assert!(path.contains("start_time=gte.2031-03-10T09%3A00%3A00%2B00%3A00"));
        assert!(path.contains("order=start_time.desc"));
        assert!(path.ends_with("limit=10"));
    }
}
