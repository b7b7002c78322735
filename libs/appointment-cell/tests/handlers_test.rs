use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::json;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};
use uuid::Uuid;

use appointment_cell::handlers::*;
use appointment_cell::models::*;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TEST_TOKEN, test_day_at};

fn create_auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(TEST_TOKEN).unwrap())
}

async fn mount_staff_day(mock_server: &MockServer, staff_id: Uuid, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("staff_id", format!("eq.{}", staff_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_check_conflicts_handler_free_slot() {
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();
    mount_staff_day(&mock_server, staff_id, json!([])).await;

    let config = TestConfig::with_url(&mock_server.uri()).to_arc();
    let query = ConflictCheckQuery {
        staff_id,
        start_time: test_day_at(14, 0),
        end_time: test_day_at(15, 0),
        exclude_appointment_id: None,
    };

    let result = check_appointment_conflicts(State(config), create_auth_header(), Query(query)).await;

    let response = result.unwrap().0;
    assert_eq!(response["has_conflict"], false);
    assert!(response["suggested_alternatives"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_conflict_handler_reports_any_conflict() {
    let mock_server = MockServer::start().await;
    let busy_staff = Uuid::new_v4();
    let free_staff = Uuid::new_v4();

    mount_staff_day(&mock_server, busy_staff, json!([
        MockSupabaseResponses::appointment_response(
            Uuid::new_v4(), Uuid::new_v4(), busy_staff,
            test_day_at(9, 0), test_day_at(10, 0), "PENDING",
        )
    ])).await;
    mount_staff_day(&mock_server, free_staff, json!([])).await;

    let config = TestConfig::with_url(&mock_server.uri()).to_arc();
    let request = BulkConflictCheckRequest {
        checks: vec![
            ConflictCheckRequest {
                staff_id: busy_staff,
                start_time: test_day_at(9, 30),
                end_time: test_day_at(10, 30),
                exclude_appointment_id: None,
            },
            ConflictCheckRequest {
                staff_id: free_staff,
                start_time: test_day_at(9, 30),
                end_time: test_day_at(10, 30),
                exclude_appointment_id: None,
            },
        ],
    };

    let response = bulk_check_appointment_conflicts(State(config), create_auth_header(), Json(request))
        .await
        .unwrap()
        .0;

    assert_eq!(response["any_conflict"], true);
    let results = response["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["has_conflict"], true);
    assert_eq!(results[1]["has_conflict"], false);
}

#[tokio::test]
async fn test_get_appointment_handler_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_url(&mock_server.uri()).to_arc();
    let result = get_appointment(State(config), Path(Uuid::new_v4()), create_auth_header()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_cancel_handler_requires_reason() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_url(&mock_server.uri()).to_arc();

    let request = CancelAppointmentRequest {
        reason: "   ".to_string(),
        cancelled_by: CancelledBy::Staff,
    };

    let result = cancel_appointment(State(config), Path(Uuid::new_v4()), create_auth_header(), Json(request)).await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn test_storage_failure_surfaces_as_database_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("connection reset", "XX000")
        ))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_url(&mock_server.uri()).to_arc();
    let params = AppointmentQueryParams {
        client_id: Some(Uuid::new_v4()),
        staff_id: None,
        status: None,
        service_type_id: None,
        from_date: None,
        to_date: None,
        limit: None,
        offset: None,
    };

    let result = search_appointments(State(config), create_auth_header(), Query(params)).await;

    assert!(matches!(result, Err(AppError::Database(_))));
}

#[tokio::test]
async fn test_upcoming_handler_filters_inactive() {
    let mock_server = MockServer::start().await;
    let client_id = Uuid::new_v4();
    let staff_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("client_id", format!("eq.{}", client_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                Uuid::new_v4(), client_id, staff_id,
                test_day_at(9, 0), test_day_at(10, 0), "SCHEDULED",
            ),
            MockSupabaseResponses::appointment_response(
                Uuid::new_v4(), client_id, staff_id,
                test_day_at(11, 0), test_day_at(12, 0), "CANCELLED",
            ),
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_url(&mock_server.uri()).to_arc();
    let query = UpcomingAppointmentsQuery {
        client_id: Some(client_id),
        staff_id: None,
        hours_ahead: Some(48),
    };

    let response = get_upcoming_appointments(State(config), create_auth_header(), Query(query))
        .await
        .unwrap()
        .0;

    assert_eq!(response["total"], 1);
    assert_eq!(response["appointments"][0]["status"], "SCHEDULED");
}
