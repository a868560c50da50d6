use axum::http::Method;
use time::macros::{datetime, offset};

use super::*;
use crate::routes::test_support::{STUDENT, login, request, send, test_app};
use crate::services::accounts::UserProfile;
use crate::services::campus::{CampusConfiguration, CampusError};

fn sample_event() -> Event {
    let organizer: UserProfile = serde_json::from_value(serde_json::json!({
        "id": 2,
        "email": "organizer@snsu.edu.ph",
        "first_name": "Maria",
        "last_name": "Santos",
        "role": "organizer",
        "campus_id": 1
    }))
    .unwrap();
    let input: EventInput = serde_json::from_value(serde_json::json!({
        "title": "Intramurals Opening",
        "date": "2025-08-18",
        "start_time": "08:00",
        "end_time": "10:00",
    }))
    .unwrap();
    event::build_event(
        &input,
        &organizer,
        1,
        &CampusConfiguration::defaults_for(1),
        "https://easuniversity.site/",
        offset!(+8),
        datetime!(2025-08-01 00:00 UTC),
    )
    .unwrap()
}

#[test]
fn event_error_to_status_maps_variants() {
    assert_eq!(event_error_to_status(&EventError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(event_error_to_status(&EventError::Forbidden), StatusCode::FORBIDDEN);
    assert_eq!(event_error_to_status(&EventError::Validation("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(event_error_to_status(&EventError::Campus(CampusError::Forbidden(4))), StatusCode::FORBIDDEN);
}

#[test]
fn qr_info_reports_expiry() {
    let event = sample_event();
    let fresh = QrInfo::for_event(&event, datetime!(2025-08-01 12:00 UTC));
    assert_eq!(fresh.qr_code_data, format!("https://easuniversity.site/attend/{}", event.id));
    assert!(!fresh.expired);

    let stale = QrInfo::for_event(&event, datetime!(2025-08-03 00:00 UTC));
    assert!(stale.expired);
}

#[test]
fn detail_flattens_event_fields() {
    let event = sample_event();
    let detail = EventDetail {
        attendance_count: 3,
        capacity_percentage: None,
        is_ongoing: false,
        can_mark_attendance: false,
        event,
    };
    let json = serde_json::to_value(detail).unwrap();
    assert_eq!(json["title"], "Intramurals Opening");
    assert_eq!(json["start_time"], "08:00");
    assert_eq!(json["attendance_count"], 3);
}

#[tokio::test]
async fn listing_requires_authentication() {
    let response = send(test_app(), request(Method::GET, "/events", None, None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_create_events() {
    let app = test_app();
    let token = login(&app, STUDENT.0, STUDENT.1).await;
    let body = serde_json::json!({
        "title": "Unofficial Party",
        "date": "2025-08-18",
        "start_time": "20:00",
        "end_time": "23:00",
    });
    let response = send(app, request(Method::POST, "/events", Some(body), Some(&token))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "not allowed to manage this event");
}

#[tokio::test]
async fn malformed_event_id_is_rejected() {
    let app = test_app();
    let token = login(&app, STUDENT.0, STUDENT.1).await;
    let response = send(app, request(Method::GET, "/events/not-a-uuid", None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
