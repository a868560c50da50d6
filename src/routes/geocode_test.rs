use std::sync::Arc;

use axum::http::Method;

use super::*;
use crate::location::{GeocodeError, ReverseGeocoder};
use crate::routes::test_support::{STUDENT, app_with, login, request, send, test_app};
use crate::state::test_helpers::test_app_state_with_geocoder;

struct FixedGeocoder(Option<&'static str>);

#[async_trait::async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn address_for(&self, _coordinate: Coordinate) -> Result<Option<String>, GeocodeError> {
        Ok(self.0.map(str::to_owned))
    }
}

struct BrokenGeocoder;

#[async_trait::async_trait]
impl ReverseGeocoder for BrokenGeocoder {
    async fn address_for(&self, _coordinate: Coordinate) -> Result<Option<String>, GeocodeError> {
        Err(GeocodeError::Response { status: 401, body: "Not Authorized - Invalid Token".into() })
    }
}

async fn lookup(geocoder: Arc<dyn ReverseGeocoder>, query: &str) -> crate::routes::test_support::TestResponse {
    let app = app_with(test_app_state_with_geocoder(geocoder));
    let token = login(&app, STUDENT.0, STUDENT.1).await;
    send(app, request(Method::GET, &format!("/geocode/reverse?{query}"), None, Some(&token))).await
}

#[tokio::test]
async fn resolves_provider_address() {
    let response = lookup(Arc::new(FixedGeocoder(Some("Narciso St., Surigao City"))), "lat=9.7893&lng=125.4954").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["address"], "Narciso St., Surigao City");
    assert_eq!(response.body["resolved"], true);
}

#[tokio::test]
async fn provider_miss_falls_back_to_coordinates() {
    let response = lookup(Arc::new(FixedGeocoder(None)), "lat=9.7893&lng=125.4954").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["address"], "9.789300, 125.495400");
    assert_eq!(response.body["resolved"], false);
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let response = lookup(Arc::new(BrokenGeocoder), "lat=9.7893&lng=125.4954").await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn out_of_range_coordinate_is_bad_request() {
    let response = lookup(Arc::new(FixedGeocoder(None)), "lat=91&lng=125").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unconfigured_geocoder_is_unavailable() {
    let app = test_app();
    let token = login(&app, STUDENT.0, STUDENT.1).await;
    let response = send(app, request(Method::GET, "/geocode/reverse?lat=9.7&lng=125.4", None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}
