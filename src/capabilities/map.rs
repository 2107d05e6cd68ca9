//! Commands for the shell-owned map widget.
//!
//! The widget (Leaflet in the web shell) lives entirely on the shell side;
//! the core drives it through these operations and only hears back an
//! acknowledgement. A failed acknowledgement is logged, never fatal.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map_view::{MapCamera, MarkerIcon};
use crate::LatLon;

#[derive(Clone)]
pub struct MapWidget<E> {
    context: CapabilityContext<MapOperation, E>,
}

impl<Ev> Capability<Ev> for MapWidget<Ev> {
    type Operation = MapOperation;
    type MappedSelf<MappedEv> = MapWidget<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        MapWidget::new(self.context.map_event(f))
    }
}

impl<E> MapWidget<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<MapOperation, E>) -> Self {
        Self { context }
    }

    fn request_from_shell<F>(&self, operation: MapOperation, callback: F)
    where
        F: FnOnce(MapResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context.request_from_shell(operation).await;
            context.update_app(callback(response));
        });
    }

    pub fn create<F>(&self, camera: MapCamera, callback: F)
    where
        F: FnOnce(MapResult) -> E + Send + 'static,
    {
        self.request_from_shell(MapOperation::Create { camera }, callback);
    }

    pub fn set_view<F>(&self, center: LatLon, zoom: f64, callback: F)
    where
        F: FnOnce(MapResult) -> E + Send + 'static,
    {
        self.request_from_shell(MapOperation::SetView { center, zoom }, callback);
    }

    /// Places the marker, or moves it if one already exists. Icon geometry
    /// travels with the call so the shell never mutates a global default.
    pub fn place_marker<F>(&self, position: LatLon, icon: MarkerIcon, callback: F)
    where
        F: FnOnce(MapResult) -> E + Send + 'static,
    {
        self.request_from_shell(MapOperation::PlaceMarker { position, icon }, callback);
    }

    /// Asks the widget to re-measure its container after the panel becomes
    /// visible again; the shell applies the defer.
    pub fn invalidate_size<F>(&self, defer_ms: u64, callback: F)
    where
        F: FnOnce(MapResult) -> E + Send + 'static,
    {
        self.request_from_shell(MapOperation::InvalidateSize { defer_ms }, callback);
    }

    pub fn destroy<F>(&self, callback: F)
    where
        F: FnOnce(MapResult) -> E + Send + 'static,
    {
        self.request_from_shell(MapOperation::Destroy, callback);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapOperation {
    Create { camera: MapCamera },
    SetView { center: LatLon, zoom: f64 },
    PlaceMarker { position: LatLon, icon: MarkerIcon },
    InvalidateSize { defer_ms: u64 },
    Destroy,
}

impl Operation for MapOperation {
    type Output = MapResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapAck;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapError {
    #[error("map widget not mounted")]
    NotMounted,

    #[error("map widget already exists")]
    AlreadyCreated,

    #[error("map widget failure: {reason}")]
    Failed { reason: String },
}

pub type MapResult = Result<MapAck, MapError>;
