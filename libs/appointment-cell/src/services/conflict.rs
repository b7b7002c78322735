use chrono::{DateTime, Duration, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, ConflictCheckRequest, ConflictCheckResponse,
    SuggestedSlot, TimeInterval,
};

// ==============================================================================
// PURE OVERLAP RULES
// ==============================================================================

/// Half-open overlap test: `[a_start, a_end)` and `[b_start, b_end)` share time.
///
/// Covers a candidate starting inside, ending inside, or containing the other
/// interval. Touching boundaries (`a_end == b_start`) do not overlap.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Active appointments in `existing` that overlap `candidate`, skipping `exclude_id`.
pub fn find_conflicts<'a>(
    candidate: &TimeInterval,
    existing: &'a [Appointment],
    exclude_id: Option<Uuid>,
) -> Vec<&'a Appointment> {
    existing
        .iter()
        .filter(|apt| Some(apt.id) != exclude_id)
        .filter(|apt| apt.is_active())
        .filter(|apt| intervals_overlap(candidate.start, candidate.end, apt.start_time, apt.end_time))
        .collect()
}

pub fn has_conflict(
    candidate: &TimeInterval,
    existing: &[Appointment],
    exclude_id: Option<Uuid>,
) -> bool {
    !find_conflicts(candidate, existing, exclude_id).is_empty()
}

/// Same-length free slots later on the candidate's day, `step_minutes` apart.
pub fn suggest_alternative_slots(
    candidate: &TimeInterval,
    existing: &[Appointment],
    exclude_id: Option<Uuid>,
    staff_id: Uuid,
    step_minutes: i64,
    limit: usize,
) -> Vec<SuggestedSlot> {
    if step_minutes <= 0 || limit == 0 {
        return Vec::new();
    }

    let length = candidate.duration();
    let step = Duration::minutes(step_minutes);
    let day_end = day_start(candidate.start) + Duration::days(1);

    let mut suggestions = Vec::new();
    let mut slot_start = candidate.start + step;

    while slot_start + length <= day_end && suggestions.len() < limit {
        let slot = TimeInterval {
            start: slot_start,
            end: slot_start + length,
        };
        if !has_conflict(&slot, existing, exclude_id) {
            suggestions.push(SuggestedSlot {
                start_time: slot.start,
                end_time: slot.end,
                staff_id,
            });
        }
        slot_start += step;
    }

    suggestions
}

fn day_start(time: DateTime<Utc>) -> DateTime<Utc> {
    time.date_naive().and_time(NaiveTime::MIN).and_utc()
}

// ==============================================================================
// STORAGE-BACKED SERVICE
// ==============================================================================

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
    suggestion_step_minutes: i64,
    max_suggestions: usize,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            suggestion_step_minutes: 30,
            max_suggestions: 3,
        }
    }

    pub fn with_suggestions(supabase: Arc<SupabaseClient>, step_minutes: i64, max_suggestions: usize) -> Self {
        Self {
            supabase,
            suggestion_step_minutes: step_minutes,
            max_suggestions,
        }
    }

    /// Check a staff member's calendar for overlaps with `[start_time, end_time)`.
    pub async fn check_conflicts(
        &self,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!("Checking conflicts for staff {} from {} to {}",
               staff_id, start_time, end_time);

        let candidate = TimeInterval::new(start_time, end_time)?;

        // Whole day so suggestions can be computed from the same snapshot
        let window_start = day_start(candidate.start);
        let window_end = std::cmp::max(candidate.end, window_start + Duration::days(1));

        let existing = self.get_staff_appointments_in_range(
            staff_id,
            window_start,
            window_end,
            exclude_appointment_id,
            auth_token,
        ).await?;

        let conflicting_appointments: Vec<Appointment> =
            find_conflicts(&candidate, &existing, exclude_appointment_id)
                .into_iter()
                .cloned()
                .collect();

        let has_conflict = !conflicting_appointments.is_empty();

        let suggested_alternatives = if has_conflict {
            warn!("Conflict detected for staff {} - {} conflicting appointments",
                  staff_id, conflicting_appointments.len());
            suggest_alternative_slots(
                &candidate,
                &existing,
                exclude_appointment_id,
                staff_id,
                self.suggestion_step_minutes,
                self.max_suggestions,
            )
        } else {
            vec![]
        };

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
            suggested_alternatives,
        })
    }

    pub async fn bulk_conflict_check(
        &self,
        requests: Vec<ConflictCheckRequest>,
        auth_token: &str,
    ) -> Result<Vec<ConflictCheckResponse>, AppointmentError> {
        debug!("Performing bulk conflict check for {} requests", requests.len());

        let mut responses = Vec::with_capacity(requests.len());

        for request in requests {
            let response = self.check_conflicts(
                request.staff_id,
                request.start_time,
                request.end_time,
                request.exclude_appointment_id,
                auth_token,
            ).await?;
            responses.push(response);
        }

        Ok(responses)
    }

    async fn get_staff_appointments_in_range(
        &self,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            format!("staff_id=eq.{}", staff_id),
            "status=neq.CANCELLED".to_string(),
            format!("start_time=lt.{}", urlencoding::encode(&end_time.to_rfc3339())),
            format!("end_time=gt.{}", urlencoding::encode(&start_time.to_rfc3339())),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}&order=start_time.asc",
                          query_parts.join("&"));

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::AppointmentStatus;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2031, 3, 10, hour, minute, 0).unwrap()
    }

    fn appointment(start: DateTime<Utc>, end: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            staff_id: Uuid::nil(),
            service_type_id: Uuid::nil(),
            start_time: start,
            end_time: end,
            status,
            notes: None,
            rating_id: None,
            created_at: at(0, 0),
            updated_at: at(0, 0),
        }
    }

    fn interval(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeInterval {
        TimeInterval::new(start, end).unwrap()
    }

    #[test]
    fn test_partial_overlap_is_conflict() {
        let existing = vec![appointment(at(10, 0), at(11, 0), AppointmentStatus::Scheduled)];
        assert!(has_conflict(&interval(at(10, 30), at(11, 30)), &existing, None));
    }

    #[test]
    fn test_touching_boundary_is_not_conflict() {
        let existing = vec![appointment(at(10, 0), at(11, 0), AppointmentStatus::Scheduled)];
        assert!(!has_conflict(&interval(at(11, 0), at(12, 0)), &existing, None));
        assert!(!has_conflict(&interval(at(9, 0), at(10, 0)), &existing, None));
    }

    #[test]
    fn test_start_end_and_containment_cases() {
        let existing = vec![appointment(at(10, 0), at(11, 0), AppointmentStatus::Pending)];
        // starts during
        assert!(has_conflict(&interval(at(10, 59), at(12, 0)), &existing, None));
        // ends during
        assert!(has_conflict(&interval(at(9, 0), at(10, 1)), &existing, None));
        // contains
        assert!(has_conflict(&interval(at(9, 0), at(12, 0)), &existing, None));
        // contained
        assert!(has_conflict(&interval(at(10, 15), at(10, 45)), &existing, None));
    }

    #[test]
    fn test_cancelled_appointments_are_ignored() {
        let existing = vec![appointment(at(10, 0), at(11, 0), AppointmentStatus::Cancelled)];
        assert!(!has_conflict(&interval(at(10, 0), at(11, 0)), &existing, None));
    }

    #[test]
    fn test_completed_appointments_still_block() {
        let existing = vec![appointment(at(10, 0), at(11, 0), AppointmentStatus::Completed)];
        assert!(has_conflict(&interval(at(10, 0), at(11, 0)), &existing, None));
    }

    #[test]
    fn test_update_excludes_itself() {
        let current = appointment(at(10, 0), at(11, 0), AppointmentStatus::Scheduled);
        let current_id = current.id;
        let existing = vec![current];

        let moved = interval(at(10, 30), at(11, 30));
        assert!(has_conflict(&moved, &existing, None));
        assert!(!has_conflict(&moved, &existing, Some(current_id)));
    }

    #[test]
    fn test_find_conflicts_returns_only_overlapping() {
        let first = appointment(at(9, 0), at(10, 0), AppointmentStatus::Scheduled);
        let second = appointment(at(10, 30), at(11, 0), AppointmentStatus::Scheduled);
        let third = appointment(at(13, 0), at(14, 0), AppointmentStatus::Scheduled);
        let second_id = second.id;
        let existing = vec![first, second, third];

        let conflicts = find_conflicts(&interval(at(10, 0), at(12, 0)), &existing, None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, second_id);
    }

    #[test]
    fn test_overlap_matches_closed_form_for_grid() {
        // Exhaustive small grid in quarter hours against the defining inequality
        let points: Vec<DateTime<Utc>> = (0..8).map(|q| at(8, 0) + Duration::minutes(15 * q)).collect();
        for a_start in 0..points.len() {
            for a_end in (a_start + 1)..points.len() {
                for b_start in 0..points.len() {
                    for b_end in (b_start + 1)..points.len() {
                        let expected = points[a_start] < points[b_end] && points[b_start] < points[a_end];
                        let forward = intervals_overlap(points[a_start], points[a_end], points[b_start], points[b_end]);
                        let backward = intervals_overlap(points[b_start], points[b_end], points[a_start], points[a_end]);
                        assert_eq!(forward, expected);
                        assert_eq!(forward, backward);
                    }
                }
            }
        }
    }

    #[test]
    fn test_interval_rejects_non_positive_length() {
        assert!(TimeInterval::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeInterval::new(at(11, 0), at(10, 0)).is_err());
        assert!(TimeInterval::new(at(10, 0), at(10, 1)).is_ok());
    }

    #[test]
    fn test_suggestions_skip_busy_slots() {
        let existing = vec![
            appointment(at(10, 0), at(11, 0), AppointmentStatus::Scheduled),
            appointment(at(11, 0), at(12, 0), AppointmentStatus::Scheduled),
        ];
        let candidate = interval(at(10, 0), at(11, 0));

        let suggestions = suggest_alternative_slots(&candidate, &existing, None, Uuid::nil(), 30, 3);

        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].start_time, at(12, 0));
        assert_eq!(suggestions[1].start_time, at(12, 30));
        assert_eq!(suggestions[2].start_time, at(13, 0));
        for slot in &suggestions {
            assert_eq!((slot.end_time - slot.start_time).num_minutes(), 60);
        }
    }

    #[test]
    fn test_suggestions_stay_within_day() {
        let existing = vec![appointment(at(22, 0), at(23, 0), AppointmentStatus::Scheduled)];
        let candidate = interval(at(22, 0), at(23, 0));

        let suggestions = suggest_alternative_slots(&candidate, &existing, None, Uuid::nil(), 30, 5);

        // Only 23:00-00:00 fits before midnight
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].start_time, at(23, 0));
    }

    #[test]
    fn test_suggestions_with_zero_limit() {
        let candidate = interval(at(10, 0), at(11, 0));
        assert!(suggest_alternative_slots(&candidate, &[], None, Uuid::nil(), 30, 0).is_empty());
        assert!(suggest_alternative_slots(&candidate, &[], None, Uuid::nil(), 0, 3).is_empty());
    }
}
