use std::sync::Arc;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub max_daily_appointments: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            max_daily_appointments: 3,
        }
    }
}

impl TestConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            max_daily_appointments: self.max_daily_appointments,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Token forwarded to the storage mock; never validated locally.
pub const TEST_TOKEN: &str = "test-access-token";

/// A fixed UTC day far enough ahead that bookings are always in the future.
pub fn test_day_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2031, 3, 10, hour, minute, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// A slot starting `hours_ahead` hours from now, `minutes` long.
pub fn future_slot(hours_ahead: i64, minutes: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc::now() + Duration::hours(hours_ahead);
    (start, start + Duration::minutes(minutes))
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_response(
        id: Uuid,
        client_id: Uuid,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "client_id": client_id,
            "staff_id": staff_id,
            "service_type_id": Uuid::nil(),
            "start_time": start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "status": status,
            "notes": null,
            "rating_id": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn rating_response(
        appointment_id: Uuid,
        client_id: Uuid,
        rating: &str,
        comment: Option<&str>,
        sentiment_score: f64,
        sentiment_category: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "client_id": client_id,
            "rating": rating,
            "comment": comment,
            "sentiment_score": sentiment_score,
            "sentiment_category": sentiment_category,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
