#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod conversation;
pub mod gemini;
pub mod grounding;
pub mod image_edit;
pub mod map_view;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::{FilePickResult, GeolocationResult, HttpResult, MapResult};
use crate::conversation::{Conversation, Message, QueryResult};
use crate::grounding::Citation;
use crate::image_edit::ImageEditSession;
use crate::map_view::{MapView, MarkerIcon, GEOLOCATED_ZOOM, LOCATE_ME_ZOOM, RESIZE_DEFER_MS};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::App as CruxApp;

/// Appended as the assistant turn whenever a grounded query fails.
pub const MAP_QUERY_FALLBACK: &str = "Sorry, I couldn't fetch the map data right now.";
pub const IMAGE_EDIT_FAILURE_MESSAGE: &str = "Failed to edit image. Please try again.";
pub const LOCATE_FAILURE_MESSAGE: &str = "Unable to retrieve your location.";

pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
pub const GEMINI_KEY_ENV_FALLBACK: &str = "API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Authentication,
    Provider,
    NoImageProduced,
    Location,
    Validation,
    FileRead,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Authentication => "AUTH_ERROR",
            Self::Provider => "PROVIDER_ERROR",
            Self::NoImageProduced => "NO_IMAGE_PRODUCED",
            Self::Location => "LOCATION_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::FileRead => "FILE_READ_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Authentication => {
                "No API key is configured. Set GEMINI_API_KEY and reload.".into()
            }
            ErrorKind::Provider => {
                "The assistant is unavailable right now. Please try again.".into()
            }
            ErrorKind::NoImageProduced => "The model did not return an edited image.".into(),
            ErrorKind::Location => LOCATE_FAILURE_MESSAGE.into(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::FileRead => "Could not read the selected file.".into(),
            ErrorKind::Internal => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

/// A geographic position, validated at the edges of the core. The fields are
/// public so view and map types can read them; construct through `new` when
/// the values come from outside.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    #[must_use]
    pub const fn as_tuple(self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// The Gemini API key. The `Debug` impl redacts it and it never appears on a
/// serialized surface.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Reads the key from `GEMINI_API_KEY`, falling back to `API_KEY`.
    /// Absence is not an error here; the first gateway call reports it.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        [GEMINI_KEY_ENV, GEMINI_KEY_ENV_FALLBACK]
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Error)
    }
}

/// The two panels of the client. Only one is visible at a time; the map
/// widget stays alive while the image panel is in front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    #[default]
    MapChat,
    ImageEditor,
}

/// Why a position fix was requested; decides the zoom applied on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPurpose {
    InitialFix,
    LocateMe,
}

impl LocationPurpose {
    #[must_use]
    pub const fn zoom(self) -> f64 {
        match self {
            Self::InitialFix => GEOLOCATED_ZOOM,
            Self::LocateMe => LOCATE_ME_ZOOM,
        }
    }
}

#[derive(Default)]
pub struct Model {
    pub api_key: Option<ApiKey>,
    pub panel: Panel,
    pub location: Option<LatLon>,
    pub locating: bool,
    pub chat_pending: bool,
    pub conversation: Conversation,
    pub map_view: MapView,
    pub image_session: ImageEditSession,
    pub active_toast: Option<ToastMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    AppStarted,
    PanelActivated(Panel),

    MapMounted,
    MapUnmounted,
    LocateMeRequested,
    PositionFetched {
        purpose: LocationPurpose,
        result: GeolocationResult,
    },
    MapAcked(MapResult),

    QuerySubmitted {
        text: String,
    },
    QueryResponse(Box<HttpResult>),

    ImageUploadRequested,
    ImagePicked(FilePickResult),
    EditSubmitted {
        instruction: String,
    },
    EditResponse(Box<HttpResult>),

    ToastDismissed,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::PanelActivated(_) => "panel_activated",
            Self::MapMounted => "map_mounted",
            Self::MapUnmounted => "map_unmounted",
            Self::LocateMeRequested => "locate_me_requested",
            Self::PositionFetched { .. } => "position_fetched",
            Self::MapAcked(_) => "map_acked",
            Self::QuerySubmitted { .. } => "query_submitted",
            Self::QueryResponse(_) => "query_response",
            Self::ImageUploadRequested => "image_upload_requested",
            Self::ImagePicked(_) => "image_picked",
            Self::EditSubmitted { .. } => "edit_submitted",
            Self::EditResponse(_) => "edit_response",
            Self::ToastDismissed => "toast_dismissed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CitationView {
    pub uri: String,
    pub title: String,
    pub is_place: bool,
    pub review_snippets: Vec<String>,
}

impl From<&Citation> for CitationView {
    fn from(c: &Citation) -> Self {
        Self {
            uri: c.uri().to_string(),
            title: c.title().to_string(),
            is_place: c.is_place(),
            review_snippets: match c {
                Citation::Place {
                    review_snippets, ..
                } => review_snippets.clone(),
                Citation::Web { .. } => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessageView {
    pub is_user: bool,
    pub text: String,
    pub citations: Vec<CitationView>,
}

impl From<&Message> for ChatMessageView {
    fn from(m: &Message) -> Self {
        match m {
            Message::User { text } => Self {
                is_user: true,
                text: text.clone(),
                citations: Vec::new(),
            },
            Message::Assistant { text, citations } => Self {
                is_user: false,
                text: text.clone(),
                citations: citations.iter().map(CitationView::from).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapPanelView {
    pub ready: bool,
    pub center: LatLon,
    pub zoom: f64,
    pub marker: Option<LatLon>,
    pub locating: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImagePanelView {
    pub has_image: bool,
    #[serde(with = "serde_bytes")]
    pub original: Option<Vec<u8>>,
    pub original_mime_type: Option<String>,
    #[serde(with = "serde_bytes")]
    pub result: Option<Vec<u8>>,
    pub editing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub panel: Panel,
    pub messages: Vec<ChatMessageView>,
    pub chat_pending: bool,
    pub map: MapPanelView,
    pub image: ImagePanelView,
    pub toast: Option<ToastView>,
}

pub mod app {
    use super::*;
    use crate::gemini;

    #[derive(Default)]
    pub struct App;

    impl App {
        /// Resolves a chat round as failed: the transcript gets the fixed
        /// fallback answer and the input unlocks.
        fn resolve_query_failure(model: &mut Model, error: &AppError) {
            tracing::error!(code = error.code(), "grounded query failed: {error}");
            model.conversation.append_assistant(QueryResult {
                answer_text: MAP_QUERY_FALLBACK.to_string(),
                citations: Vec::new(),
            });
        }

        /// Releases the edit slot and tells the user what happened. A model
        /// that answered without an image is reported distinctly, so the user
        /// knows to rephrase rather than retry the same instruction.
        fn resolve_edit_failure(model: &mut Model, error: &AppError) {
            tracing::error!(code = error.code(), "image edit failed: {error}");
            model.image_session.fail_edit();

            let message = match error.kind {
                ErrorKind::NoImageProduced => error.user_facing_message(),
                _ => IMAGE_EDIT_FAILURE_MESSAGE.to_string(),
            };
            model.active_toast = Some(ToastMessage::error(message));
        }

        /// Moves the camera and marker onto a fresh fix, mirroring the widget
        /// commands into the core-side view state.
        fn apply_position(model: &mut Model, caps: &Capabilities, here: LatLon, zoom: f64) {
            model.location = Some(here);

            if !model.map_view.is_ready() {
                return;
            }

            model.map_view.recenter(here, zoom);
            caps.map.set_view(here, zoom, Event::MapAcked);

            model.map_view.place_marker(here);
            caps.map
                .place_marker(here, MarkerIcon::default(), Event::MapAcked);
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            tracing::debug!(event = event.name(), "update");

            match event {
                Event::AppStarted => {
                    model.api_key = ApiKey::from_env();
                    if model.api_key.is_none() {
                        tracing::warn!("no Gemini API key in environment");
                    }
                    caps.render.render();
                }

                Event::PanelActivated(panel) => {
                    let was = model.panel;
                    model.panel = panel;

                    // Returning to the map after it was hidden leaves Leaflet
                    // with a stale container size.
                    if was != panel && panel == Panel::MapChat && model.map_view.is_ready() {
                        caps.map.invalidate_size(RESIZE_DEFER_MS, Event::MapAcked);
                    }
                    caps.render.render();
                }

                Event::MapMounted => {
                    if model.map_view.mount() {
                        caps.map.create(model.map_view.camera(), Event::MapAcked);
                        model.locating = true;
                        caps.geolocation
                            .get_current_position(|result| Event::PositionFetched {
                                purpose: LocationPurpose::InitialFix,
                                result,
                            });
                    }
                    caps.render.render();
                }

                Event::MapUnmounted => {
                    if model.map_view.dispose() {
                        caps.map.destroy(Event::MapAcked);
                    }
                    caps.render.render();
                }

                Event::LocateMeRequested => {
                    if !model.map_view.is_ready() || model.locating {
                        return;
                    }
                    model.locating = true;
                    caps.geolocation
                        .get_current_position(|result| Event::PositionFetched {
                            purpose: LocationPurpose::LocateMe,
                            result,
                        });
                    caps.render.render();
                }

                Event::PositionFetched { purpose, result } => {
                    model.locating = false;

                    match result {
                        Ok(position) => {
                            match LatLon::new(position.latitude, position.longitude) {
                                Ok(here) => {
                                    Self::apply_position(model, caps, here, purpose.zoom());
                                }
                                Err(e) => {
                                    tracing::warn!("platform reported invalid position: {e}");
                                }
                            }
                        }
                        Err(e) => {
                            // The map stays on its default view; only an
                            // explicit locate-me gets user-visible feedback.
                            tracing::warn!("geolocation failed: {e}");
                            if purpose == LocationPurpose::LocateMe {
                                model.active_toast =
                                    Some(ToastMessage::error(LOCATE_FAILURE_MESSAGE));
                            }
                        }
                    }
                    caps.render.render();
                }

                Event::MapAcked(result) => {
                    if let Err(e) = result {
                        tracing::warn!("map widget command failed: {e}");
                    }
                }

                Event::QuerySubmitted { text } => {
                    if model.chat_pending {
                        return;
                    }
                    let query = text.trim().to_string();
                    if query.is_empty() {
                        return;
                    }

                    model.conversation.append_user(&query);
                    model.chat_pending = true;

                    match gemini::grounded_query_request(
                        model.api_key.as_ref(),
                        &query,
                        model.location,
                    ) {
                        Ok(request) => {
                            caps.http
                                .execute(request, |r| Event::QueryResponse(Box::new(r)));
                        }
                        Err(e) => {
                            model.chat_pending = false;
                            Self::resolve_query_failure(model, &e);
                        }
                    }
                    caps.render.render();
                }

                Event::QueryResponse(result) => {
                    // Unlock before touching the payload; no outcome may
                    // leave the input stuck.
                    model.chat_pending = false;

                    match gemini::parse_grounded_response(&result) {
                        Ok(answer) => model.conversation.append_assistant(answer),
                        Err(e) => Self::resolve_query_failure(model, &e),
                    }
                    caps.render.render();
                }

                Event::ImageUploadRequested => {
                    if model.image_session.is_pending() {
                        return;
                    }
                    caps.file_picker.pick_image(Event::ImagePicked);
                }

                Event::ImagePicked(result) => {
                    match result {
                        Ok(file) => {
                            if let Err(e) = model.image_session.load_image(file.data) {
                                let error = AppError::from(e);
                                tracing::warn!("rejected picked file: {error}");
                                model.active_toast =
                                    Some(ToastMessage::error(error.user_facing_message()));
                            }
                        }
                        Err(e) if e.is_cancellation() => {}
                        Err(e) => {
                            tracing::warn!("file pick failed: {e}");
                            let error = AppError::new(ErrorKind::FileRead, e.to_string());
                            model.active_toast =
                                Some(ToastMessage::error(error.user_facing_message()));
                        }
                    }
                    caps.render.render();
                }

                Event::EditSubmitted { instruction } => {
                    let instruction = instruction.trim().to_string();

                    let image = match model.image_session.begin_edit(&instruction) {
                        Ok(image) => image,
                        Err(e) => {
                            tracing::debug!("edit not started: {e}");
                            return;
                        }
                    };

                    match gemini::edit_image_request(model.api_key.as_ref(), &image, &instruction)
                    {
                        Ok(request) => {
                            caps.http
                                .execute(request, |r| Event::EditResponse(Box::new(r)));
                        }
                        Err(e) => Self::resolve_edit_failure(model, &e),
                    }
                    caps.render.render();
                }

                Event::EditResponse(result) => {
                    match gemini::parse_edited_image(&result) {
                        Ok(bytes) => model.image_session.complete_edit(bytes),
                        Err(e) => Self::resolve_edit_failure(model, &e),
                    }
                    caps.render.render();
                }

                Event::ToastDismissed => {
                    model.active_toast = None;
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let camera = model.map_view.camera();

            ViewModel {
                panel: model.panel,
                messages: model
                    .conversation
                    .snapshot()
                    .iter()
                    .map(ChatMessageView::from)
                    .collect(),
                chat_pending: model.chat_pending,
                map: MapPanelView {
                    ready: model.map_view.is_ready(),
                    center: camera.center,
                    zoom: camera.zoom,
                    marker: model.map_view.marker(),
                    locating: model.locating,
                },
                image: ImagePanelView {
                    has_image: model.image_session.original().is_some(),
                    original: model.image_session.original().map(|img| img.data.clone()),
                    original_mime_type: model
                        .image_session
                        .original()
                        .map(|img| img.mime_type.clone()),
                    result: model.image_session.result_bytes().map(<[u8]>::to_vec),
                    editing: model.image_session.is_pending(),
                },
                toast: model.active_toast.as_ref().map(ToastView::from),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlon_rejects_out_of_range() {
        assert!(LatLon::new(91.0, 0.0).is_err());
        assert!(LatLon::new(-91.0, 0.0).is_err());
        assert!(LatLon::new(0.0, 181.0).is_err());
        assert!(LatLon::new(0.0, -181.0).is_err());
        assert!(LatLon::new(f64::NAN, 0.0).is_err());
        assert!(LatLon::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_latlon_accepts_boundaries() {
        assert!(LatLon::new(90.0, 180.0).is_ok());
        assert!(LatLon::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");
        assert_eq!(key.expose(), "super-secret");
    }

    #[test]
    fn test_user_facing_messages_never_leak_internals() {
        let err = AppError::new(ErrorKind::Provider, "HTTP 500 at https://internal");
        assert!(!err.user_facing_message().contains("internal"));

        let err = AppError::new(ErrorKind::Validation, "edit instruction is empty");
        assert_eq!(err.user_facing_message(), "edit instruction is empty");
    }

    #[test]
    fn test_location_purpose_zoom_levels() {
        assert_eq!(LocationPurpose::InitialFix.zoom(), GEOLOCATED_ZOOM);
        assert_eq!(LocationPurpose::LocateMe.zoom(), LOCATE_ME_ZOOM);
    }

    #[test]
    fn test_toast_error_duration_is_longest() {
        let toast = ToastMessage::error("boom");
        assert_eq!(toast.duration_ms, ToastKind::Error.default_duration_ms());
        assert!(toast.duration_ms > ToastKind::Info.default_duration_ms());
    }

    #[test]
    fn test_event_names_are_stable() {
        assert_eq!(Event::AppStarted.name(), "app_started");
        assert_eq!(
            Event::QuerySubmitted { text: "x".into() }.name(),
            "query_submitted"
        );
        assert_eq!(Event::ToastDismissed.name(), "toast_dismissed");
    }
}
