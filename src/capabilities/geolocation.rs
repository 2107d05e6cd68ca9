//! One-shot device geolocation.
//!
//! Failure is a normal outcome here, the map just degrades to its default
//! view, so every error carries enough context to log but none is fatal.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone)]
pub struct Geolocation<E> {
    context: CapabilityContext<GeolocationOperation, E>,
}

impl<Ev> Capability<Ev> for Geolocation<Ev> {
    type Operation = GeolocationOperation;
    type MappedSelf<MappedEv> = Geolocation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Geolocation::new(self.context.map_event(f))
    }
}

impl<E> Geolocation<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<GeolocationOperation, E>) -> Self {
        Self { context }
    }

    pub fn get_current_position<F>(&self, callback: F)
    where
        F: FnOnce(GeolocationResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context
                .request_from_shell(GeolocationOperation::GetCurrentPosition)
                .await;
            context.update_app(callback(response));
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeolocationOperation {
    GetCurrentPosition,
}

impl Operation for GeolocationOperation {
    type Output = GeolocationResult;
}

/// A raw position as reported by the platform; validated into core
/// coordinates by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("position request timed out")]
    Timeout,
}

impl GeolocationError {
    #[must_use]
    pub const fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

pub type GeolocationResult = Result<GeoPosition, GeolocationError>;
