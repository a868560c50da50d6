//! The location picker state machine and its command handle.
//!
//! DESIGN
//! ======
//! All map state is owned by the picker instance (`surface` is an owned
//! value, not a shared reference) and is released in [`LocationPicker::teardown`],
//! which also runs on drop. Owners never touch the surface directly: they
//! send [`PickerCommand`]s through a [`PickerHandle`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::geocoder::ReverseGeocoder;
use super::geolocation::{GeolocationError, GeolocationOptions, GeolocationProvider};
use super::surface::{MapEvent, MapSurface};
use super::{LocationSource, SelectedLocation};
use crate::geo::Coordinate;

pub const DEFAULT_ZOOM: f64 = 16.0;
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Callback invoked with every new Selected Location.
pub type LocationCallback = Box<dyn FnMut(&SelectedLocation) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerPhase {
    Uninitialized,
    AwaitingGeolocation,
    MapLoading,
    Ready,
    TornDown,
}

impl PickerPhase {
    fn is_live(self) -> bool {
        matches!(self, Self::MapLoading | Self::Ready)
    }
}

/// Operations an owner may invoke on a mounted picker.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerCommand {
    /// Move the map and marker to a location chosen elsewhere (e.g. a saved venue).
    SetLocation { coordinate: Coordinate, address: Option<String> },
    /// Re-measure the canvas after the container was shown or resized.
    Remeasure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PickerError {
    #[error("picker already mounted")]
    AlreadyMounted,
    #[error("picker is no longer running")]
    Closed,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable reference through which the owner steers a running picker.
#[derive(Clone)]
pub struct PickerHandle {
    commands: mpsc::Sender<PickerCommand>,
}

impl PickerHandle {
    /// Create a handle and the receiver to pass to [`LocationPicker::run`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<PickerCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        (Self { commands: tx }, rx)
    }

    /// # Errors
    ///
    /// Returns [`PickerError::Closed`] if the picker has stopped.
    pub async fn set_location(&self, coordinate: Coordinate, address: Option<String>) -> Result<(), PickerError> {
        self.send(PickerCommand::SetLocation { coordinate, address })
            .await
    }

    /// # Errors
    ///
    /// Returns [`PickerError::Closed`] if the picker has stopped.
    pub async fn remeasure(&self) -> Result<(), PickerError> {
        self.send(PickerCommand::Remeasure).await
    }

    async fn send(&self, command: PickerCommand) -> Result<(), PickerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PickerError::Closed)
    }
}

// =============================================================================
// PICKER
// =============================================================================

pub struct LocationPicker<S: MapSurface> {
    provider: Arc<dyn GeolocationProvider>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    surface: Option<S>,
    options: GeolocationOptions,
    fallback: Coordinate,
    zoom: f64,
    phase: PickerPhase,
    /// Initial selection, held until the map reports `Loaded`.
    pending: Option<SelectedLocation>,
    current: Option<SelectedLocation>,
    geolocation_requests: u32,
    on_change: LocationCallback,
}

impl<S: MapSurface> LocationPicker<S> {
    #[must_use]
    pub fn new(
        provider: Arc<dyn GeolocationProvider>,
        surface: S,
        fallback: Coordinate,
        on_change: LocationCallback,
    ) -> Self {
        Self {
            provider,
            geocoder: None,
            surface: Some(surface),
            options: GeolocationOptions::default(),
            fallback,
            zoom: DEFAULT_ZOOM,
            phase: PickerPhase::Uninitialized,
            pending: None,
            current: None,
            geolocation_requests: 0,
            on_change,
        }
    }

    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: GeolocationOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn phase(&self) -> PickerPhase {
        self.phase
    }

    /// Last emitted selection.
    #[must_use]
    pub fn current(&self) -> Option<&SelectedLocation> {
        self.current.as_ref()
    }

    /// Number of position requests issued. At most one per mount.
    #[must_use]
    pub fn geolocation_requests(&self) -> u32 {
        self.geolocation_requests
    }

    /// Resolve the initial location and start loading the map.
    ///
    /// With a `seed`, no geolocation request is made. Otherwise the device is
    /// asked once; any failure (including exceeding the options timeout)
    /// resolves to the fallback coordinate tagged with the failure reason.
    ///
    /// # Errors
    ///
    /// Returns [`PickerError::AlreadyMounted`] if called twice.
    pub async fn mount(&mut self, seed: Option<SelectedLocation>) -> Result<(), PickerError> {
        if self.phase != PickerPhase::Uninitialized {
            return Err(PickerError::AlreadyMounted);
        }

        let initial = match seed {
            Some(seed) => SelectedLocation { source: LocationSource::Seeded, ..seed },
            None => {
                self.phase = PickerPhase::AwaitingGeolocation;
                self.resolve_device_location().await
            }
        };

        self.phase = PickerPhase::MapLoading;
        if let Some(surface) = self.surface.as_mut() {
            surface.initialize(initial.coordinate, self.zoom);
        }
        self.pending = Some(initial);
        Ok(())
    }

    async fn resolve_device_location(&mut self) -> SelectedLocation {
        self.geolocation_requests += 1;
        let request = self.provider.current_position(&self.options);
        let outcome = match tokio::time::timeout(self.options.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout),
        };

        match outcome {
            Ok(fix) => {
                let source = LocationSource::Device { accuracy_m: fix.accuracy_m };
                describe(self.geocoder.clone(), fix.coordinate, source).await
            }
            Err(reason) => {
                warn!(%reason, "geolocation failed; using fallback coordinate");
                describe(self.geocoder.clone(), self.fallback, LocationSource::Fallback { reason }).await
            }
        }
    }

    /// Apply a map event. Returns whether the event was accepted.
    pub async fn handle_event(&mut self, event: MapEvent) -> bool {
        match (self.phase, event) {
            (PickerPhase::MapLoading, MapEvent::Loaded) => {
                self.phase = PickerPhase::Ready;
                let Some(initial) = self.pending.take() else {
                    return false;
                };
                if let Some(surface) = self.surface.as_mut() {
                    surface.place_marker(initial.coordinate);
                }
                self.emit(initial);
                true
            }
            (PickerPhase::Ready, MapEvent::Click(at)) => {
                self.select(at, LocationSource::MapClick).await;
                true
            }
            (PickerPhase::Ready, MapEvent::MarkerDragEnd(at)) => {
                self.select(at, LocationSource::MarkerDrag).await;
                true
            }
            (phase, event) => {
                debug!(?phase, ?event, "map event ignored");
                false
            }
        }
    }

    /// Apply an owner command. Returns whether the command was accepted.
    pub async fn handle_command(&mut self, command: PickerCommand) -> bool {
        match command {
            PickerCommand::SetLocation { coordinate, address } => {
                if self.phase != PickerPhase::Ready {
                    debug!(phase = ?self.phase, "set_location before map ready ignored");
                    return false;
                }
                if let Some(surface) = self.surface.as_mut() {
                    surface.fly_to(coordinate, self.zoom);
                    surface.place_marker(coordinate);
                }
                let selected = match address {
                    Some(address) => SelectedLocation::new(coordinate, LocationSource::External).with_address(Some(address)),
                    None => describe(self.geocoder.clone(), coordinate, LocationSource::External).await,
                };
                self.emit(selected);
                true
            }
            PickerCommand::Remeasure => {
                if !self.phase.is_live() {
                    return false;
                }
                if let Some(surface) = self.surface.as_mut() {
                    surface.resize();
                }
                true
            }
        }
    }

    /// Drive the picker from its event and command channels until both close,
    /// then release the map.
    pub async fn run(mut self, mut events: mpsc::Receiver<MapEvent>, mut commands: mpsc::Receiver<PickerCommand>) {
        let mut events_open = true;
        let mut commands_open = true;
        while events_open || commands_open {
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.handle_event(event).await;
                    }
                    None => events_open = false,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => {
                        self.handle_command(command).await;
                    }
                    None => commands_open = false,
                },
            }
        }
        debug!(last = ?self.current().map(|s| s.coordinate), "picker channels closed");
        self.teardown();
    }

    /// Release the map instance. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.teardown();
        }
        self.pending = None;
        self.phase = PickerPhase::TornDown;
    }

    async fn select(&mut self, at: Coordinate, source: LocationSource) {
        if let Some(surface) = self.surface.as_mut() {
            surface.place_marker(at);
        }
        let selected = describe(self.geocoder.clone(), at, source).await;
        self.emit(selected);
    }

    fn emit(&mut self, selected: SelectedLocation) {
        (self.on_change)(&selected);
        self.current = Some(selected);
    }
}

/// Build a selection, upgrading the address through the geocoder when one is set.
async fn describe(
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    coordinate: Coordinate,
    source: LocationSource,
) -> SelectedLocation {
    let selected = SelectedLocation::new(coordinate, source);
    let Some(geocoder) = geocoder else {
        return selected;
    };
    match geocoder.address_for(coordinate).await {
        Ok(address) => selected.with_address(address),
        Err(e) => {
            warn!(error = %e, "reverse geocoding failed; keeping coordinate address");
            selected
        }
    }
}

impl<S: MapSurface> Drop for LocationPicker<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "picker_test.rs"]
mod tests;
