//! Map panel state: lifecycle of the shell-owned map widget and the
//! geolocation marker it carries.

use serde::{Deserialize, Serialize};

use crate::LatLon;

pub const DEFAULT_CENTER: LatLon = LatLon {
    lat: 51.505,
    lon: -0.09,
};
pub const DEFAULT_ZOOM: f64 = 13.0;
pub const GEOLOCATED_ZOOM: f64 = 14.0;
pub const LOCATE_ME_ZOOM: f64 = 15.0;
pub const RESIZE_DEFER_MS: u64 = 100;

/// Explicit marker icon geometry, passed at marker placement time so no
/// process-wide default needs to be mutated. Defaults match the stock
/// Leaflet pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerIcon {
    pub icon_url: String,
    pub retina_url: String,
    pub shadow_url: String,
    pub icon_size: (u32, u32),
    pub icon_anchor: (u32, u32),
    pub popup_anchor: (i32, i32),
    pub shadow_size: (u32, u32),
}

impl Default for MarkerIcon {
    fn default() -> Self {
        Self {
            icon_url: "https://unpkg.com/leaflet@1.7.1/dist/images/marker-icon.png".into(),
            retina_url: "https://unpkg.com/leaflet@1.7.1/dist/images/marker-icon-2x.png".into(),
            shadow_url: "https://unpkg.com/leaflet@1.7.1/dist/images/marker-shadow.png".into(),
            icon_size: (25, 41),
            icon_anchor: (12, 41),
            popup_anchor: (1, -34),
            shadow_size: (41, 41),
        }
    }
}

/// The view the widget should show.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCamera {
    pub center: LatLon,
    pub zoom: f64,
}

impl Default for MapCamera {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MapLifecycle {
    #[default]
    Uninitialized,
    Ready,
    Disposed,
}

/// Core-side mirror of the live widget. The shell owns the actual map; this
/// tracks what the core believes the widget is showing so recenters and
/// marker moves can be issued idempotently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    lifecycle: MapLifecycle,
    camera: MapCamera,
    marker: Option<LatLon>,
}

impl MapView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn lifecycle(&self) -> MapLifecycle {
        self.lifecycle
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.lifecycle, MapLifecycle::Ready)
    }

    #[must_use]
    pub const fn camera(&self) -> MapCamera {
        self.camera
    }

    #[must_use]
    pub const fn marker(&self) -> Option<LatLon> {
        self.marker
    }

    /// First mount creates the widget at the default view. Re-entrant mounts
    /// are no-ops, keyed on the widget already existing.
    pub fn mount(&mut self) -> bool {
        if !matches!(self.lifecycle, MapLifecycle::Uninitialized) {
            return false;
        }
        self.lifecycle = MapLifecycle::Ready;
        self.camera = MapCamera::default();
        true
    }

    /// Records a recenter onto a freshly fetched position.
    pub fn recenter(&mut self, position: LatLon, zoom: f64) {
        debug_assert!(self.is_ready());
        self.camera = MapCamera {
            center: position,
            zoom,
        };
    }

    /// Records the marker move, returning whether this placement creates it.
    pub fn place_marker(&mut self, position: LatLon) -> bool {
        let created = self.marker.is_none();
        self.marker = Some(position);
        created
    }

    /// Releases the widget. No operations are valid afterwards.
    pub fn dispose(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.lifecycle = MapLifecycle::Disposed;
        self.marker = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_is_reentrant_noop() {
        let mut view = MapView::new();
        assert!(view.mount());
        assert!(view.is_ready());
        assert!(!view.mount());
        assert!(view.is_ready());
    }

    #[test]
    fn test_default_view_matches_initial_widget() {
        let mut view = MapView::new();
        view.mount();
        assert_eq!(view.camera().center, DEFAULT_CENTER);
        assert_eq!(view.camera().zoom, DEFAULT_ZOOM);
    }

    #[test]
    fn test_marker_created_then_moved() {
        let mut view = MapView::new();
        view.mount();

        let first = LatLon::new(35.6, 139.7).unwrap();
        let second = LatLon::new(35.7, 139.8).unwrap();

        assert!(view.place_marker(first));
        assert!(!view.place_marker(second));
        assert_eq!(view.marker(), Some(second));
    }

    #[test]
    fn test_dispose_only_from_ready() {
        let mut view = MapView::new();
        assert!(!view.dispose());

        view.mount();
        assert!(view.dispose());
        assert_eq!(view.lifecycle(), MapLifecycle::Disposed);

        // no resurrection
        assert!(!view.mount());
        assert!(!view.dispose());
    }
}
