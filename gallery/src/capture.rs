//! Permission-checked access to the camera and the photo picker.

use gallery_api::{Capability, CaptureConfig, CaptureOutcome, CaptureSource, CaptureUi};
use permissions::PermissionController;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The caller skipped the permission step.
    #[error("Capture requires the {0} permission")]
    PreconditionFailed(Capability),
    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Camera and photo-picker front end. A user cancel is `Ok(Cancelled)`.
pub struct CaptureService {
    ui: Arc<dyn CaptureUi>,
    permissions: Arc<PermissionController>,
}

impl CaptureService {
    pub fn new(ui: Arc<dyn CaptureUi>, permissions: Arc<PermissionController>) -> Self {
        Self { ui, permissions }
    }

    pub async fn pick_from_library(&self, config: &CaptureConfig) -> Result<CaptureOutcome, CaptureError> {
        self.capture(CaptureSource::Library, config).await
    }

    pub async fn take_photo(&self, config: &CaptureConfig) -> Result<CaptureOutcome, CaptureError> {
        self.capture(CaptureSource::Camera, config).await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, config)))]
    pub async fn capture(
        &self,
        source: CaptureSource,
        config: &CaptureConfig,
    ) -> Result<CaptureOutcome, CaptureError> {
        let capability = source.required_capability();
        if !self.permissions.query(capability).is_granted() {
            return Err(CaptureError::PreconditionFailed(capability));
        }

        let result = match source {
            CaptureSource::Camera => self.ui.take_photo(config).await,
            CaptureSource::Library => self.ui.pick_image(config).await,
        };
        match result {
            Ok(CaptureOutcome::Cancelled) => {
                tracing::debug!(%source, "Capture cancelled by user");
                Ok(CaptureOutcome::Cancelled)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(%source, error = %e, "Capture failed");
                Err(CaptureError::Failed(e.to_string()))
            }
        }
    }
}
