use super::*;
use crate::services::accounts::Role;

fn profile() -> UserProfile {
    UserProfile {
        id: 7,
        email: "juan@snsu.edu.ph".into(),
        first_name: "Juan".into(),
        middle_name: String::new(),
        last_name: "Cruz".into(),
        role: Role::Student,
        campus_id: 1,
        student_id: None,
        department: String::new(),
        course: String::new(),
        year_level: String::new(),
        section: String::new(),
        phone: "0917".into(),
        is_verified: false,
        accessible_campus_ids: Vec::new(),
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

#[test]
fn success_serializes_with_data() {
    let json = serde_json::to_value(ServiceResponse::Success(TokenStatus { valid: true })).unwrap();
    assert_eq!(json, serde_json::json!({"success": true, "data": {"valid": true}}));
}

#[test]
fn failure_serializes_with_message() {
    let json = serde_json::to_value(ServiceResponse::<()>::Failure(INVALID_CREDENTIALS.into())).unwrap();
    assert_eq!(json, serde_json::json!({"success": false, "message": "Invalid email or password"}));
}

#[test]
fn unit_success_has_null_data() {
    let json = serde_json::to_value(ServiceResponse::Success(())).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["data"].is_null());
}

#[test]
fn from_result_keeps_expected_messages() {
    let response = ServiceResponse::<()>::from_result("test", Err(AuthError::WrongPassword));
    assert_eq!(response.message(), Some(WRONG_PASSWORD));

    let response = ServiceResponse::<()>::from_result("test", Err(AuthError::Validation("bad input".into())));
    assert_eq!(response.message(), Some("bad input"));
}

#[test]
fn from_result_hides_unexpected_causes() {
    let response = ServiceResponse::<()>::from_result("test", Err(AuthError::Hash("cost out of range".into())));
    assert_eq!(response.message(), Some(UNEXPECTED_ERROR));

    let response = ServiceResponse::<()>::from_result("test", Err(AuthError::Database(sqlx::Error::PoolTimedOut)));
    assert_eq!(response.message(), Some(UNEXPECTED_ERROR));
}

#[test]
fn expected_classification() {
    assert!(AuthError::InvalidCredentials.is_expected());
    assert!(AuthError::NotAuthenticated.is_expected());
    assert!(!AuthError::Storage("full".into()).is_expected());
    assert!(!AuthError::Database(sqlx::Error::PoolClosed).is_expected());
}

// =============================================================================
// INPUT HELPERS
// =============================================================================

#[test]
fn normalize_email_lowercases_and_trims() {
    assert_eq!(normalize_email("  Juan@SNSU.edu.ph "), Some("juan@snsu.edu.ph".into()));
}

#[test]
fn normalize_email_rejects_malformed() {
    for raw in ["", "juan", "@snsu.edu.ph", "juan@", "a@b@c"] {
        assert_eq!(normalize_email(raw), None, "expected rejection for {raw:?}");
    }
}

#[test]
fn password_length_is_enforced() {
    assert!(validate_new_password("1234567").is_err());
    assert!(validate_new_password("12345678").is_ok());
}

#[test]
fn registration_requires_names() {
    let registration: Registration = serde_json::from_value(serde_json::json!({
        "email": "new@snsu.edu.ph",
        "password": "longenough",
        "first_name": " ",
        "last_name": "Cruz",
        "campus_id": 1
    }))
    .unwrap();
    assert!(matches!(registration.validate(), Err(AuthError::Validation(_))));
}

#[test]
fn profile_update_touches_only_present_fields() {
    let mut user = profile();
    let update = ProfileUpdate {
        first_name: Some("  Juanito ".into()),
        section: Some("B".into()),
        ..ProfileUpdate::default()
    };
    update.apply_to(&mut user);

    assert_eq!(user.first_name, "Juanito");
    assert_eq!(user.section, "B");
    assert_eq!(user.last_name, "Cruz");
    assert_eq!(user.phone, "0917");
}
