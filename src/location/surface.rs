//! Map rendering seam.
//!
//! A [`MapSurface`] is exclusively owned by one picker. It only draws; all
//! selection state lives in the picker. Input flows back as [`MapEvent`]s.

use crate::geo::Coordinate;

/// Events emitted by the map library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    /// Style and tiles are ready; the map has a concrete center.
    Loaded,
    Click(Coordinate),
    MarkerDragEnd(Coordinate),
}

pub trait MapSurface: Send {
    /// Create the map centered on `center`. Completion is signalled by [`MapEvent::Loaded`].
    fn initialize(&mut self, center: Coordinate, zoom: f64);
    /// Animate the viewport to `center`.
    fn fly_to(&mut self, center: Coordinate, zoom: f64);
    /// Create the draggable marker, or move it if it exists.
    fn place_marker(&mut self, at: Coordinate);
    /// Re-measure the canvas after the container changed size or visibility.
    fn resize(&mut self);
    /// Release the map instance and its marker.
    fn teardown(&mut self);
}
