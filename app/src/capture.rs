use async_trait::async_trait;
use gallery_api::{CaptureConfig, CaptureOutcome, CaptureUi, CapturedImage, PlatformError};
use std::path::{Path, PathBuf};

/// Camera and picker stand-in for a terminal: the "captured" image is a file
/// chosen up front. Without one the capture counts as cancelled.
#[derive(Debug, Clone, Default)]
pub struct FileCaptureUi {
    source: Option<PathBuf>,
}

impl FileCaptureUi {
    pub fn new(source: Option<PathBuf>) -> Self {
        Self { source }
    }

    fn resolve(&self, kind: &str, config: &CaptureConfig) -> Result<CaptureOutcome, PlatformError> {
        let Some(path) = &self.source else {
            tracing::debug!(kind, "No image file given");
            return Ok(CaptureOutcome::Cancelled);
        };
        if !path.is_file() {
            return Err(PlatformError::Device(format!("No image at {}", path.display())));
        }
        tracing::debug!(
            kind,
            path = %path.display(),
            quality = config.quality,
            allows_editing = config.allows_editing,
            "Using image file"
        );
        Ok(CaptureOutcome::Captured(CapturedImage {
            uri: path_to_uri(path),
        }))
    }
}

fn path_to_uri(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

#[async_trait]
impl CaptureUi for FileCaptureUi {
    async fn pick_image(&self, config: &CaptureConfig) -> Result<CaptureOutcome, PlatformError> {
        self.resolve("library", config)
    }

    async fn take_photo(&self, config: &CaptureConfig) -> Result<CaptureOutcome, PlatformError> {
        self.resolve("camera", config)
    }
}
