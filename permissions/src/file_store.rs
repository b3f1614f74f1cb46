//! Grant decisions kept in a JSON file, standing in for the OS settings screen.

use async_trait::async_trait;
use gallery_api::{Capability, PermissionState, PermissionsApi, PlatformError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const GRANTS_FILE_NAME: &str = "permissions.json";

/// Answers permission requests from `permissions.json`.
///
/// Capabilities without an entry resolve to `default_decision` when requested and
/// to `Unknown` when queried.
pub struct FileGrantStore {
    path: PathBuf,
    default_decision: PermissionState,
}

impl FileGrantStore {
    pub fn new(path: PathBuf, default_decision: PermissionState) -> Self {
        Self {
            path,
            default_decision,
        }
    }

    /// `permissions.json` inside `dir`.
    pub fn in_dir(dir: &Path, default_decision: PermissionState) -> Self {
        Self::new(dir.join(GRANTS_FILE_NAME), default_decision)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BTreeMap<String, PermissionState>, PlatformError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|e| {
            PlatformError::Permission(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    pub fn set(&self, capability: Capability, state: PermissionState) -> Result<(), PlatformError> {
        let mut grants = self.load()?;
        grants.insert(capability.as_str().to_string(), state);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&grants)
            .map_err(|e| PlatformError::Permission(e.to_string()))?;
        std::fs::write(&self.path, data)?;
        tracing::info!(%capability, ?state, path = %self.path.display(), "Stored permission decision");
        Ok(())
    }

    pub fn grant(&self, capability: Capability) -> Result<(), PlatformError> {
        self.set(capability, PermissionState::Granted)
    }

    pub fn revoke(&self, capability: Capability) -> Result<(), PlatformError> {
        self.set(capability, PermissionState::Denied)
    }

    fn stored(&self, capability: Capability) -> Result<Option<PermissionState>, PlatformError> {
        Ok(self.load()?.get(capability.as_str()).copied())
    }
}

#[async_trait]
impl PermissionsApi for FileGrantStore {
    async fn request(&self, capability: Capability) -> Result<PermissionState, PlatformError> {
        match self.stored(capability)? {
            Some(PermissionState::Unknown) | None => Ok(self.default_decision),
            Some(state) => Ok(state),
        }
    }

    async fn query(&self, capability: Capability) -> Result<PermissionState, PlatformError> {
        Ok(self.stored(capability)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_default_decision() {
        let dir = TempDir::new().unwrap();
        let store = FileGrantStore::in_dir(dir.path(), PermissionState::Denied);
        assert_eq!(
            store.request(Capability::LibraryRead).await.unwrap(),
            PermissionState::Denied
        );
        assert_eq!(
            store.query(Capability::LibraryRead).await.unwrap(),
            PermissionState::Unknown
        );
    }

    #[tokio::test]
    async fn test_grant_and_revoke_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileGrantStore::in_dir(dir.path(), PermissionState::Denied);
        store.grant(Capability::Camera).unwrap();
        assert!(store.path().exists());
        assert_eq!(
            store.request(Capability::Camera).await.unwrap(),
            PermissionState::Granted
        );
        store.revoke(Capability::Camera).unwrap();
        assert_eq!(
            store.request(Capability::Camera).await.unwrap(),
            PermissionState::Denied
        );
        // Other capabilities are untouched.
        assert_eq!(
            store.query(Capability::LibraryWrite).await.unwrap(),
            PermissionState::Unknown
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_permission_error() {
        let dir = TempDir::new().unwrap();
        let store = FileGrantStore::in_dir(dir.path(), PermissionState::Granted);
        std::fs::write(store.path(), "not json").unwrap();
        let err = store.request(Capability::Camera).await.unwrap_err();
        assert!(matches!(err, PlatformError::Permission(_)));
    }
}
