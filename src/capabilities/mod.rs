mod file_picker;
mod geolocation;
mod http;
mod map;

pub use self::file_picker::{
    FilePickError, FilePickResult, FilePicker, FilePickerOperation, PickConfig, PickedFile,
};
pub use self::geolocation::{
    GeoPosition, Geolocation, GeolocationError, GeolocationOperation, GeolocationResult,
};
pub use self::http::{
    HttpError, HttpMethod, HttpOperation, HttpRequest, HttpResponse, HttpResult,
};
pub use self::map::{MapAck, MapError, MapOperation, MapResult, MapWidget};

// The Effect derive names each variant after the field's type, so the map
// capability appears here under the `Map` alias to produce `Effect::Map`.
use self::map::MapWidget as Map;

pub use crux_core::render::Render;

use crate::Event;

pub type AppHttp = http::Http<Event>;
pub type AppGeolocation = Geolocation<Event>;
pub type AppMapWidget = MapWidget<Event>;
pub type AppFilePicker = FilePicker<Event>;
pub type AppRender = Render<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: http::Http<Event>,
    pub geolocation: Geolocation<Event>,
    pub map: Map<Event>,
    pub file_picker: FilePicker<Event>,
    pub render: Render<Event>,
}
