use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::*;
use crate::geo::GpsFix;
use crate::location::geocoder::GeocodeError;
use crate::location::headless::{RecordingSurface, StaticProvider, SurfaceCall};

// =============================================================================
// FAKES
// =============================================================================

fn campus() -> Coordinate {
    Coordinate::new(9.7893, 125.4954).unwrap()
}

fn coord(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).unwrap()
}

/// Collects every emitted location.
fn recorder() -> (LocationCallback, Arc<Mutex<Vec<SelectedLocation>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: LocationCallback = Box::new(move |loc: &SelectedLocation| {
        sink.lock().unwrap().push(loc.clone());
    });
    (callback, seen)
}

struct CountingProvider {
    calls: AtomicU32,
    fix: GpsFix,
}

#[async_trait::async_trait]
impl GeolocationProvider for CountingProvider {
    async fn current_position(&self, _options: &GeolocationOptions) -> Result<GpsFix, GeolocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fix)
    }
}

struct SlowProvider;

#[async_trait::async_trait]
impl GeolocationProvider for SlowProvider {
    async fn current_position(&self, _options: &GeolocationOptions) -> Result<GpsFix, GeolocationError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(GeolocationError::PositionUnavailable)
    }
}

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
        Err(GeocodeError::Request("connection refused".into()))
    }
}

fn denied_picker(surface: RecordingSurface, callback: LocationCallback) -> LocationPicker<RecordingSurface> {
    LocationPicker::new(
        Arc::new(StaticProvider::failing(GeolocationError::PermissionDenied)),
        surface,
        campus(),
        callback,
    )
}

async fn ready_picker() -> (LocationPicker<RecordingSurface>, RecordingSurface, Arc<Mutex<Vec<SelectedLocation>>>) {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface.clone(), callback);
    picker.mount(None).await.unwrap();
    assert!(picker.handle_event(MapEvent::Loaded).await);
    (picker, surface, seen)
}

// =============================================================================
// GEOLOCATION FALLBACK
// =============================================================================

#[tokio::test]
async fn denied_geolocation_settles_on_fallback_once() {
    let (picker, _surface, seen) = ready_picker().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].coordinate, campus());
    assert_eq!(seen[0].source, LocationSource::Fallback { reason: GeolocationError::PermissionDenied });
    assert_eq!(seen[0].address, "9.789300, 125.495400");
    assert_eq!(picker.phase(), PickerPhase::Ready);
}

#[tokio::test]
async fn timed_out_geolocation_settles_on_fallback_once() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let options = GeolocationOptions { timeout: Duration::from_millis(20), ..GeolocationOptions::default() };
    let mut picker = LocationPicker::new(Arc::new(SlowProvider), surface.clone(), campus(), callback).with_options(options);

    picker.mount(None).await.unwrap();
    picker.handle_event(MapEvent::Loaded).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].coordinate, campus());
    assert_eq!(seen[0].source, LocationSource::Fallback { reason: GeolocationError::Timeout });
}

#[tokio::test]
async fn unsupported_geolocation_is_tagged_as_fallback() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = LocationPicker::new(
        Arc::new(StaticProvider::failing(GeolocationError::Unsupported)),
        surface,
        campus(),
        callback,
    );
    picker.mount(None).await.unwrap();
    picker.handle_event(MapEvent::Loaded).await;

    let seen = seen.lock().unwrap();
    assert!(seen[0].source.is_fallback());
}

#[tokio::test]
async fn device_fix_centers_map_on_reading() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let here = coord(9.61, 125.48);
    let provider = Arc::new(CountingProvider { calls: AtomicU32::new(0), fix: GpsFix { coordinate: here, accuracy_m: Some(8.0) } });
    let mut picker = LocationPicker::new(provider.clone(), surface.clone(), campus(), callback);

    picker.mount(None).await.unwrap();
    assert_eq!(surface.calls(), vec![SurfaceCall::Initialize(here)]);
    picker.handle_event(MapEvent::Loaded).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].coordinate, here);
    assert_eq!(seen[0].source, LocationSource::Device { accuracy_m: Some(8.0) });
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn nothing_emitted_before_map_loaded() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface, callback);

    picker.mount(None).await.unwrap();

    assert_eq!(picker.phase(), PickerPhase::MapLoading);
    assert!(seen.lock().unwrap().is_empty());
    assert!(picker.current().is_none());
}

#[tokio::test]
async fn second_mount_is_rejected_without_new_request() {
    let surface = RecordingSurface::new();
    let (callback, _seen) = recorder();
    let mut picker = denied_picker(surface, callback);

    picker.mount(None).await.unwrap();
    assert_eq!(picker.mount(None).await, Err(PickerError::AlreadyMounted));
    assert_eq!(picker.geolocation_requests(), 1);
}

#[tokio::test]
async fn seeded_mount_skips_geolocation() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let provider = Arc::new(CountingProvider {
        calls: AtomicU32::new(0),
        fix: GpsFix { coordinate: campus(), accuracy_m: None },
    });
    let mut picker = LocationPicker::new(provider.clone(), surface.clone(), campus(), callback);
    let seed = SelectedLocation::new(coord(9.6, 125.5), LocationSource::MapClick).with_address(Some("Del Carmen".into()));

    picker.mount(Some(seed)).await.unwrap();
    picker.handle_event(MapEvent::Loaded).await;

    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert_eq!(picker.geolocation_requests(), 0);
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].source, LocationSource::Seeded);
    assert_eq!(seen[0].address, "Del Carmen");
    assert_eq!(surface.marker(), Some(coord(9.6, 125.5)));
}

#[tokio::test]
async fn duplicate_loaded_event_is_ignored() {
    let (mut picker, _surface, seen) = ready_picker().await;
    assert!(!picker.handle_event(MapEvent::Loaded).await);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn teardown_releases_surface_once() {
    let (mut picker, surface, _seen) = ready_picker().await;
    picker.teardown();
    picker.teardown();
    drop(picker);

    let teardowns = surface
        .calls()
        .into_iter()
        .filter(|c| *c == SurfaceCall::Teardown)
        .count();
    assert_eq!(teardowns, 1);
}

#[tokio::test]
async fn drop_tears_down_surface() {
    let surface = RecordingSurface::new();
    let (callback, _seen) = recorder();
    let picker = denied_picker(surface.clone(), callback);
    drop(picker);
    assert_eq!(surface.calls(), vec![SurfaceCall::Teardown]);
}

// =============================================================================
// USER INPUT
// =============================================================================

#[tokio::test]
async fn click_reports_clicked_coordinate_and_moves_marker() {
    let (mut picker, surface, seen) = ready_picker().await;
    let clicked = coord(9.790_123, 125.496_789);

    assert!(picker.handle_event(MapEvent::Click(clicked)).await);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!((seen[1].coordinate.lat() - clicked.lat()).abs() < 1e-12);
    assert!((seen[1].coordinate.lng() - clicked.lng()).abs() < 1e-12);
    assert_eq!(seen[1].source, LocationSource::MapClick);
    assert_eq!(surface.marker(), Some(clicked));
    assert_eq!(picker.current().map(|c| c.coordinate), Some(clicked));
}

#[tokio::test]
async fn marker_drag_end_reports_new_position() {
    let (mut picker, _surface, seen) = ready_picker().await;
    let dropped = coord(9.7, 125.4);

    picker.handle_event(MapEvent::MarkerDragEnd(dropped)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[1].coordinate, dropped);
    assert_eq!(seen[1].source, LocationSource::MarkerDrag);
}

#[tokio::test]
async fn click_before_ready_is_ignored() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface, callback);
    picker.mount(None).await.unwrap();

    assert!(!picker.handle_event(MapEvent::Click(coord(1.0, 1.0))).await);
    assert!(seen.lock().unwrap().is_empty());
}

// =============================================================================
// COMMANDS
// =============================================================================

#[tokio::test]
async fn set_location_flies_and_emits_external() {
    let (mut picker, surface, seen) = ready_picker().await;
    let venue = coord(9.55, 125.5167);

    let accepted = picker
        .handle_command(PickerCommand::SetLocation { coordinate: venue, address: Some("Mainit Gym".into()) })
        .await;

    assert!(accepted);
    assert!(surface.calls().contains(&SurfaceCall::FlyTo(venue)));
    assert_eq!(surface.marker(), Some(venue));
    let seen = seen.lock().unwrap();
    assert_eq!(seen[1].source, LocationSource::External);
    assert_eq!(seen[1].address, "Mainit Gym");
}

#[tokio::test]
async fn set_location_before_ready_is_rejected() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface, callback);
    picker.mount(None).await.unwrap();

    let accepted = picker
        .handle_command(PickerCommand::SetLocation { coordinate: coord(1.0, 1.0), address: None })
        .await;
    assert!(!accepted);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn remeasure_resizes_live_map_only() {
    let surface = RecordingSurface::new();
    let (callback, _seen) = recorder();
    let mut picker = denied_picker(surface.clone(), callback);

    assert!(!picker.handle_command(PickerCommand::Remeasure).await);
    picker.mount(None).await.unwrap();
    assert!(picker.handle_command(PickerCommand::Remeasure).await);
    assert_eq!(surface.calls().last(), Some(&SurfaceCall::Resize));
}

// =============================================================================
// GEOCODING
// =============================================================================

#[tokio::test]
async fn geocoder_result_replaces_placeholder_address() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface, callback).with_geocoder(Arc::new(FixedGeocoder(Some("Surigao City"))));
    picker.mount(None).await.unwrap();
    picker.handle_event(MapEvent::Loaded).await;

    assert_eq!(seen.lock().unwrap()[0].address, "Surigao City");
}

#[tokio::test]
async fn geocoder_failure_keeps_coordinate_address() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface, callback).with_geocoder(Arc::new(BrokenGeocoder));
    picker.mount(None).await.unwrap();
    picker.handle_event(MapEvent::Loaded).await;
    picker.handle_event(MapEvent::Click(coord(9.5, 125.5))).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].address, "9.789300, 125.495400");
    assert_eq!(seen[1].address, "9.500000, 125.500000");
}

#[tokio::test]
async fn geocoder_without_match_keeps_coordinate_address() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface, callback).with_geocoder(Arc::new(FixedGeocoder(None)));
    picker.mount(None).await.unwrap();
    picker.handle_event(MapEvent::Loaded).await;

    assert_eq!(seen.lock().unwrap()[0].address, "9.789300, 125.495400");
}

// =============================================================================
// DRIVER
// =============================================================================

#[tokio::test]
async fn run_processes_channels_and_tears_down_on_close() {
    let surface = RecordingSurface::new();
    let (callback, seen) = recorder();
    let mut picker = denied_picker(surface.clone(), callback);
    picker.mount(None).await.unwrap();

    let (event_tx, event_rx) = mpsc::channel(8);
    let (handle, command_rx) = PickerHandle::channel();
    let task = tokio::spawn(picker.run(event_rx, command_rx));

    event_tx.send(MapEvent::Loaded).await.unwrap();
    event_tx.send(MapEvent::Click(coord(9.78, 125.49))).await.unwrap();
    handle.remeasure().await.unwrap();
    drop(event_tx);
    drop(handle);
    task.await.unwrap();

    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(surface.calls().last(), Some(&SurfaceCall::Teardown));
}

#[tokio::test]
async fn handle_reports_closed_after_picker_stops() {
    let (handle, command_rx) = PickerHandle::channel();
    drop(command_rx);
    assert_eq!(handle.remeasure().await, Err(PickerError::Closed));
}
