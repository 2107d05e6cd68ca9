//! Image file selection, delegated to the shell's file input.
//!
//! The shell performs the dialog and the data-URL/bytes decode; the core
//! receives raw bytes. Cancellation is a quiet outcome, not an error the
//! user ever sees.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image_edit::SOFT_MAX_UPLOAD_BYTES;

#[derive(Clone)]
pub struct FilePicker<E> {
    context: CapabilityContext<FilePickerOperation, E>,
}

impl<Ev> Capability<Ev> for FilePicker<Ev> {
    type Operation = FilePickerOperation;
    type MappedSelf<MappedEv> = FilePicker<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        FilePicker::new(self.context.map_event(f))
    }
}

impl<E> FilePicker<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<FilePickerOperation, E>) -> Self {
        Self { context }
    }

    pub fn pick_image<F>(&self, callback: F)
    where
        F: FnOnce(FilePickResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context
                .request_from_shell(FilePickerOperation::PickImage {
                    config: PickConfig::default(),
                })
                .await;
            context.update_app(callback(response));
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickConfig {
    /// Accept filter for the shell's file dialog.
    pub accept: String,
    /// Soft guidance only; the shell may warn but the core does not enforce.
    pub soft_max_bytes: usize,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            accept: "image/*".into(),
            soft_max_bytes: SOFT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilePickerOperation {
    PickImage { config: PickConfig },
}

impl Operation for FilePickerOperation {
    type Output = FilePickResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedFile {
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilePickError {
    #[error("selection cancelled")]
    Cancelled,

    #[error("file could not be read: {reason}")]
    Unreadable { reason: String },
}

impl FilePickError {
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type FilePickResult = Result<PickedFile, FilePickError>;
