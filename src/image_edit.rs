//! State machine for a single-image AI edit session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AppError, ErrorKind};

pub const SOFT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
}

impl ImageFormat {
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }

    /// The original client tagged every upload as JPEG; keep that as the
    /// fallback when the bytes are unrecognizable.
    #[must_use]
    pub fn sniff_or_jpeg(data: &[u8]) -> Self {
        Self::from_magic_bytes(data).unwrap_or(Self::Jpeg)
    }
}

/// The photo currently loaded for editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl UploadedImage {
    pub fn new(data: Vec<u8>) -> Result<Self, SessionError> {
        if data.is_empty() {
            return Err(SessionError::EmptyImage);
        }
        let mime_type = ImageFormat::sniff_or_jpeg(&data).mime_type().to_string();
        Ok(Self { data, mime_type })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditPhase {
    #[default]
    Empty,
    ImageLoaded,
    Pending,
    ResultReady,
}

impl EditPhase {
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SessionError {
    #[error("no image loaded")]
    NoImage,
    #[error("image data is empty")]
    EmptyImage,
    #[error("edit instruction is empty")]
    EmptyInstruction,
    #[error("an edit is already in flight")]
    AlreadyPending,
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

/// Holds the uploaded photo, the latest edited result, and the in-flight
/// status of a single edit round. At most one edit may be pending at a time;
/// the pending guard here is the source of truth and UI disablement is a
/// derived view of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEditSession {
    phase: EditPhase,
    original: Option<UploadedImage>,
    #[serde(with = "serde_bytes")]
    result: Option<Vec<u8>>,
}

impl ImageEditSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> EditPhase {
        self.phase
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.phase.is_pending()
    }

    #[must_use]
    pub fn original(&self) -> Option<&UploadedImage> {
        self.original.as_ref()
    }

    #[must_use]
    pub fn result_bytes(&self) -> Option<&[u8]> {
        self.result.as_deref()
    }

    /// Loads a new original, replacing any previous one and clearing any
    /// prior result. Rejected while an edit is in flight.
    pub fn load_image(&mut self, data: Vec<u8>) -> Result<(), SessionError> {
        if self.phase.is_pending() {
            return Err(SessionError::AlreadyPending);
        }
        self.original = Some(UploadedImage::new(data)?);
        self.result = None;
        self.phase = EditPhase::ImageLoaded;
        Ok(())
    }

    /// Validates and claims the in-flight slot for one edit round, returning
    /// the image to send. The gateway call must not be issued unless this
    /// succeeds.
    pub fn begin_edit(&mut self, instruction: &str) -> Result<UploadedImage, SessionError> {
        if self.phase.is_pending() {
            return Err(SessionError::AlreadyPending);
        }
        if instruction.trim().is_empty() {
            return Err(SessionError::EmptyInstruction);
        }
        let original = self.original.clone().ok_or(SessionError::NoImage)?;
        self.phase = EditPhase::Pending;
        Ok(original)
    }

    /// Stores the edited bytes for a resolved round.
    pub fn complete_edit(&mut self, result: Vec<u8>) {
        self.result = Some(result);
        self.phase = EditPhase::ResultReady;
    }

    /// Releases the in-flight slot after a failed round. The original image
    /// is retained so the user can retry; any stale result is cleared.
    pub fn fail_edit(&mut self) {
        self.result = None;
        self.phase = if self.original.is_some() {
            EditPhase::ImageLoaded
        } else {
            EditPhase::Empty
        };
    }
}
