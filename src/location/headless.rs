//! Headless adapters: a fixed-answer geolocation provider, a surface that
//! records draw calls instead of rendering, and a scripted session that drives
//! a running picker through its channels. The `locate` command is built on
//! these; tests use them as fakes.

use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::picker::LocationCallback;
use super::{
    GeolocationError, GeolocationOptions, GeolocationProvider, LocationPicker, MapEvent, MapSurface, PickerError,
    PickerHandle, ReverseGeocoder, SelectedLocation,
};
use crate::geo::{Coordinate, GeoError, GpsFix};

/// Provider that always answers with the same outcome.
pub struct StaticProvider {
    outcome: Result<GpsFix, GeolocationError>,
}

impl StaticProvider {
    #[must_use]
    pub fn fix(fix: GpsFix) -> Self {
        Self { outcome: Ok(fix) }
    }

    #[must_use]
    pub fn failing(error: GeolocationError) -> Self {
        Self { outcome: Err(error) }
    }
}

#[async_trait::async_trait]
impl GeolocationProvider for StaticProvider {
    async fn current_position(&self, _options: &GeolocationOptions) -> Result<GpsFix, GeolocationError> {
        self.outcome
    }
}

/// One call made against a [`RecordingSurface`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceCall {
    Initialize(Coordinate),
    FlyTo(Coordinate),
    PlaceMarker(Coordinate),
    Resize,
    Teardown,
}

/// Surface that appends every call to a shared log.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    calls: Arc<Mutex<Vec<SurfaceCall>>>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Where the marker currently sits, if one was placed.
    #[must_use]
    pub fn marker(&self) -> Option<Coordinate> {
        self.calls().iter().rev().find_map(|call| match call {
            SurfaceCall::PlaceMarker(at) => Some(*at),
            _ => None,
        })
    }

    fn record(&self, call: SurfaceCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl MapSurface for RecordingSurface {
    fn initialize(&mut self, center: Coordinate, _zoom: f64) {
        self.record(SurfaceCall::Initialize(center));
    }

    fn fly_to(&mut self, center: Coordinate, _zoom: f64) {
        self.record(SurfaceCall::FlyTo(center));
    }

    fn place_marker(&mut self, at: Coordinate) {
        self.record(SurfaceCall::PlaceMarker(at));
    }

    fn resize(&mut self) {
        self.record(SurfaceCall::Resize);
    }

    fn teardown(&mut self) {
        self.record(SurfaceCall::Teardown);
    }
}

// =============================================================================
// SCRIPTED SESSION
// =============================================================================

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One input applied to a ready picker: map gestures arrive as [`MapEvent`]s,
/// owner operations go through the [`PickerHandle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocateStep {
    Click(Coordinate),
    Drag(Coordinate),
    Set(Coordinate),
    Remeasure,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepParseError {
    #[error("unknown step {0:?}; expected click:LAT,LNG, drag:LAT,LNG, set:LAT,LNG or remeasure")]
    Unknown(String),
    #[error("expected LAT,LNG, got {0:?}")]
    Malformed(String),
    #[error(transparent)]
    Coordinate(#[from] GeoError),
}

impl FromStr for LocateStep {
    type Err = StepParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("remeasure") {
            return Ok(Self::Remeasure);
        }
        let (kind, pair) = raw
            .split_once(':')
            .ok_or_else(|| StepParseError::Unknown(raw.to_owned()))?;
        let at = parse_pair(pair)?;
        match kind.trim().to_ascii_lowercase().as_str() {
            "click" => Ok(Self::Click(at)),
            "drag" => Ok(Self::Drag(at)),
            "set" => Ok(Self::Set(at)),
            _ => Err(StepParseError::Unknown(raw.to_owned())),
        }
    }
}

fn parse_pair(pair: &str) -> Result<Coordinate, StepParseError> {
    let malformed = || StepParseError::Malformed(pair.to_owned());
    let (lat, lng) = pair.split_once(',').ok_or_else(malformed)?;
    let lat = lat.trim().parse::<f64>().map_err(|_| malformed())?;
    let lng = lng.trim().parse::<f64>().map_err(|_| malformed())?;
    Ok(Coordinate::new(lat, lng)?)
}

/// Mount a picker on a [`RecordingSurface`], run it on its event and command
/// channels, finish the map load, apply `steps` in order, and return every
/// selection it reported.
///
/// # Errors
///
/// Propagates [`PickerError`] from mounting, or [`PickerError::Closed`] if
/// the picker stops before the script is done.
pub async fn locate(
    provider: Arc<dyn GeolocationProvider>,
    fallback: Coordinate,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    options: GeolocationOptions,
    steps: &[LocateStep],
) -> Result<Vec<SelectedLocation>, PickerError> {
    let (reported, mut selections) = mpsc::unbounded_channel();
    let on_change: LocationCallback = Box::new(move |selected: &SelectedLocation| {
        // The receiver lives until the script ends.
        let _ = reported.send(selected.clone());
    });

    let surface = RecordingSurface::new();
    let mut picker = LocationPicker::new(provider, surface.clone(), fallback, on_change).with_options(options);
    if let Some(geocoder) = geocoder {
        picker = picker.with_geocoder(geocoder);
    }
    picker.mount(None).await?;
    debug!(phase = ?picker.phase(), requests = picker.geolocation_requests(), "picker mounted");

    let (events, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (handle, command_rx) = PickerHandle::channel();

    let script = async move {
        let send = |event| {
            let events = events.clone();
            async move { events.send(event).await.map_err(|_| PickerError::Closed) }
        };

        send(MapEvent::Loaded).await?;
        let mut history: Vec<SelectedLocation> = selections.recv().await.into_iter().collect();
        for step in steps {
            match *step {
                LocateStep::Click(at) => send(MapEvent::Click(at)).await?,
                LocateStep::Drag(at) => send(MapEvent::MarkerDragEnd(at)).await?,
                LocateStep::Set(at) => handle.set_location(at, None).await?,
                LocateStep::Remeasure => {
                    handle.remeasure().await?;
                    continue;
                }
            }
            history.extend(selections.recv().await);
        }
        Ok::<_, PickerError>(history)
    };

    let ((), history) = tokio::join!(picker.run(event_rx, command_rx), script);
    debug!(marker = ?surface.marker(), draw_calls = surface.calls().len(), "headless map released");
    history
}

#[cfg(test)]
#[path = "headless_test.rs"]
mod tests;
