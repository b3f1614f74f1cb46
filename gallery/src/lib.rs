//! Gallery state orchestration: permissions, the cached asset grid, capture and
//! album writes, tied together by [`GalleryViewModel`].

pub mod album_writer;
pub mod capture;
pub mod repository;
pub mod view_model;

pub use album_writer::{AlbumWriter, SaveError};
pub use capture::{CaptureError, CaptureService};
pub use repository::{AssetCollection, AssetRepository, ReloadOutcome, ReloadTicket, RepositoryError};
pub use view_model::{GallerySnapshot, GalleryViewModel, Notice, NoticeKind, ScreenState, ViewerState};

use gallery_api::{CaptureConfig, DEFAULT_ALBUM_NAME, DEFAULT_PAGE_SIZE};
use permissions::PermissionError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryConfig {
    /// Upper bound for every reload, including the one after a save.
    pub page_size: usize,
    pub album_name: String,
    pub capture: CaptureConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            album_name: DEFAULT_ALBUM_NAME.to_string(),
            capture: CaptureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GalleryError {
    #[error("Permission Error: {0}")]
    Permission(#[from] PermissionError),
    #[error("Load Error: {0}")]
    Load(#[from] RepositoryError),
    #[error("Capture Error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Save Error: {0}")]
    Save(#[from] SaveError),
}

impl GalleryError {
    /// Short machine-readable code, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            _ if self.is_precondition() => "precondition",
            GalleryError::Permission(_) => "permission",
            GalleryError::Load(_) => "load",
            GalleryError::Capture(_) => "capture",
            GalleryError::Save(_) => "save",
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            GalleryError::Capture(CaptureError::PreconditionFailed(_))
                | GalleryError::Save(SaveError::PreconditionFailed(_))
        )
    }

    /// Text shown to the user in the pending notice.
    pub fn user_message(&self) -> String {
        match self {
            GalleryError::Permission(_) => "Failed to check permissions".to_string(),
            GalleryError::Load(_) => "Failed to load images".to_string(),
            GalleryError::Capture(CaptureError::PreconditionFailed(cap))
            | GalleryError::Save(SaveError::PreconditionFailed(cap)) => {
                format!("Missing {} permission", cap)
            }
            GalleryError::Capture(_) => "Failed to capture image".to_string(),
            GalleryError::Save(_) => "Failed to save image to gallery".to_string(),
        }
    }
}
