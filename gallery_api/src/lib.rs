//! Shared data model and platform ports for the image gallery.
//!
//! The gallery core never talks to the device directly. Everything it needs from
//! the platform (permission dialogs, the photo store, the camera/picker UI) goes
//! through the three traits defined here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default album that captured and picked images are saved into.
pub const DEFAULT_ALBUM_NAME: &str = "Image Gallery App";

/// Default number of assets fetched per reload.
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    LibraryRead,
    LibraryWrite,
    Camera,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::LibraryRead,
        Capability::LibraryWrite,
        Capability::Camera,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::LibraryRead => "library_read",
            Capability::LibraryWrite => "library_write",
            Capability::Camera => "camera",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "library_read" | "read" => Ok(Capability::LibraryRead),
            "library_write" | "write" => Ok(Capability::LibraryWrite),
            "camera" => Ok(Capability::Camera),
            other => Err(PlatformError::Other(format!("Unknown capability: {}", other))),
        }
    }
}

/// Authorization state of a single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    #[default]
    Unknown,
    Denied,
    Granted,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

/// A photo entry from the device photo store. Never mutated by the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub uri: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
}

/// Transient image produced by the camera or the picker, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedImage {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured(CapturedImage),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Camera,
    Library,
}

impl CaptureSource {
    /// Capability that must be granted before this source may be opened.
    pub fn required_capability(self) -> Capability {
        match self {
            CaptureSource::Camera => Capability::Camera,
            CaptureSource::Library => Capability::LibraryRead,
        }
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Camera => write!(f, "camera"),
            CaptureSource::Library => write!(f, "photo library"),
        }
    }
}

/// Options handed through to the capture UI untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub allows_editing: bool,
    pub aspect: (u32, u32),
    pub quality: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            allows_editing: true,
            aspect: (1, 1),
            quality: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Failure reported by a platform collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Permission subsystem error: {0}")]
    Permission(String),
    #[error("Media store error: {0}")]
    Store(String),
    #[error("Capture device error: {0}")]
    Device(String),
    #[error("IO Error: {0}")]
    Io(String),
    #[error("Other Error: {0}")]
    Other(String),
}

impl From<std::io::Error> for PlatformError {
    fn from(e: std::io::Error) -> Self {
        PlatformError::Io(e.to_string())
    }
}

#[async_trait]
pub trait PermissionsApi: Send + Sync {
    /// Shows the system dialog (if the OS decides to) and resolves with the decision.
    async fn request(&self, capability: Capability) -> Result<PermissionState, PlatformError>;

    async fn query(&self, capability: Capability) -> Result<PermissionState, PlatformError>;
}

#[async_trait]
pub trait MediaStoreApi: Send + Sync {
    async fn list_assets(&self, page_size: usize, order: SortOrder) -> Result<Vec<Asset>, PlatformError>;

    /// Copies the image behind `image_uri` into the store as a new asset.
    async fn persist(&self, image_uri: &str) -> Result<Asset, PlatformError>;

    async fn get_album(&self, name: &str) -> Result<Option<Album>, PlatformError>;

    /// Creates `name` with `seed` as its first member. Must be atomic.
    async fn create_album(&self, name: &str, seed: &Asset) -> Result<Album, PlatformError>;

    /// Adds `asset` to `album`. Membership is a set: adding an existing member is a
    /// no-op and returns `false`.
    async fn add_to_album(&self, asset: &Asset, album: &Album) -> Result<bool, PlatformError>;
}

#[async_trait]
pub trait CaptureUi: Send + Sync {
    async fn pick_image(&self, config: &CaptureConfig) -> Result<CaptureOutcome, PlatformError>;

    async fn take_photo(&self, config: &CaptureConfig) -> Result<CaptureOutcome, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_asset() {
        let json = r#"{
            "id": "asset-1",
            "uri": "file:///photos/1.jpg",
            "createdAt": "2024-05-01T10:00:00Z"
        }"#;

        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.id, "asset-1");
        assert_eq!(asset.uri, "file:///photos/1.jpg");
        assert_eq!(asset.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_capability_from_str() {
        assert_eq!("camera".parse::<Capability>().unwrap(), Capability::Camera);
        assert_eq!("library-read".parse::<Capability>().unwrap(), Capability::LibraryRead);
        assert_eq!("LIBRARY_WRITE".parse::<Capability>().unwrap(), Capability::LibraryWrite);
        assert!("microphone".parse::<Capability>().is_err());
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn test_capture_source_capability() {
        assert_eq!(CaptureSource::Camera.required_capability(), Capability::Camera);
        assert_eq!(CaptureSource::Library.required_capability(), Capability::LibraryRead);
    }

    #[test]
    fn test_permission_state_defaults_to_unknown() {
        assert_eq!(PermissionState::default(), PermissionState::Unknown);
        assert!(!PermissionState::Denied.is_granted());
        assert!(PermissionState::Granted.is_granted());
    }

    #[test]
    fn test_capture_config_defaults() {
        let cfg = CaptureConfig::default();
        assert!(cfg.allows_editing);
        assert_eq!(cfg.aspect, (1, 1));
        assert!((cfg.quality - 0.8).abs() < f32::EPSILON);
    }
}
