//! Permission gate for the photo library and camera.

#[cfg(feature = "file-store")]
mod file_store;

#[cfg(feature = "file-store")]
pub use file_store::FileGrantStore;

use gallery_api::{Capability, PermissionState, PermissionsApi};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Permission query failed: {0}")]
    QueryFailed(String),
}

/// Remembers the last answer the OS gave for each capability.
///
/// State only changes through [`PermissionController::request`]; nothing here
/// polls the system, so a decision changed in the OS settings is picked up the
/// next time a caller re-requests.
pub struct PermissionController {
    api: Arc<dyn PermissionsApi>,
    states: Mutex<HashMap<Capability, PermissionState>>,
}

impl PermissionController {
    pub fn new(api: Arc<dyn PermissionsApi>) -> Self {
        Self {
            api,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Last known state, `Unknown` until the first request resolves.
    pub fn query(&self, capability: Capability) -> PermissionState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability)
            .copied()
            .unwrap_or_default()
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn request(&self, capability: Capability) -> Result<PermissionState, PermissionError> {
        let answer = self.api.request(capability).await.map_err(|e| {
            tracing::error!(error = %e, %capability, "Permission request failed");
            PermissionError::QueryFailed(format!("{}: {}", capability, e))
        })?;
        // An undetermined answer after the dialog closed counts as a decline.
        let state = match answer {
            PermissionState::Granted => PermissionState::Granted,
            PermissionState::Denied | PermissionState::Unknown => PermissionState::Denied,
        };
        self.record(capability, state);
        tracing::info!(%capability, ?state, "Permission resolved");
        Ok(state)
    }

    /// Requests `capability` unless it is already granted.
    pub async fn ensure(&self, capability: Capability) -> Result<PermissionState, PermissionError> {
        match self.query(capability) {
            PermissionState::Granted => Ok(PermissionState::Granted),
            _ => self.request(capability).await,
        }
    }

    fn record(&self, capability: Capability, state: PermissionState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(capability, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_api::PlatformError;
    use mocks::FakePermissions;

    #[tokio::test]
    async fn test_query_defaults_to_unknown() {
        let controller = PermissionController::new(Arc::new(FakePermissions::granting_all()));
        for cap in Capability::ALL {
            assert_eq!(controller.query(cap), PermissionState::Unknown);
        }
    }

    #[tokio::test]
    async fn test_request_records_decision() {
        let fake = Arc::new(FakePermissions::granting_all());
        fake.set_decision(Capability::Camera, PermissionState::Denied);
        let controller = PermissionController::new(fake.clone());

        assert_eq!(
            controller.request(Capability::LibraryRead).await.unwrap(),
            PermissionState::Granted
        );
        assert_eq!(
            controller.request(Capability::Camera).await.unwrap(),
            PermissionState::Denied
        );
        assert_eq!(controller.query(Capability::LibraryRead), PermissionState::Granted);
        assert_eq!(controller.query(Capability::Camera), PermissionState::Denied);
        assert_eq!(controller.query(Capability::LibraryWrite), PermissionState::Unknown);
    }

    #[tokio::test]
    async fn test_rerequest_picks_up_settings_change() {
        let fake = Arc::new(FakePermissions::granting_all());
        fake.set_decision(Capability::LibraryRead, PermissionState::Denied);
        let controller = PermissionController::new(fake.clone());

        assert_eq!(
            controller.request(Capability::LibraryRead).await.unwrap(),
            PermissionState::Denied
        );
        fake.set_decision(Capability::LibraryRead, PermissionState::Granted);
        // Not polled: the cached answer stays until the next request.
        assert_eq!(controller.query(Capability::LibraryRead), PermissionState::Denied);
        assert_eq!(
            controller.request(Capability::LibraryRead).await.unwrap(),
            PermissionState::Granted
        );
    }

    #[tokio::test]
    async fn test_undetermined_answer_is_denied() {
        let fake = Arc::new(FakePermissions::granting_all());
        fake.set_decision(Capability::Camera, PermissionState::Unknown);
        let controller = PermissionController::new(fake);
        assert_eq!(
            controller.request(Capability::Camera).await.unwrap(),
            PermissionState::Denied
        );
    }

    #[tokio::test]
    async fn test_system_failure_is_query_failed() {
        let fake = Arc::new(FakePermissions::granting_all());
        fake.fail_with(PlatformError::Permission("service unavailable".into()));
        let controller = PermissionController::new(fake);

        let err = controller.request(Capability::LibraryRead).await.unwrap_err();
        assert!(matches!(err, PermissionError::QueryFailed(_)));
        assert_eq!(controller.query(Capability::LibraryRead), PermissionState::Unknown);
    }

    #[tokio::test]
    async fn test_ensure_skips_dialog_when_granted() {
        let fake = Arc::new(FakePermissions::granting_all());
        let controller = PermissionController::new(fake.clone());

        controller.ensure(Capability::Camera).await.unwrap();
        controller.ensure(Capability::Camera).await.unwrap();
        assert_eq!(fake.request_count(Capability::Camera), 1);
    }
}
