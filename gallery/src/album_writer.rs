//! Saving captured images into the gallery album.

use gallery_api::{Asset, Capability, MediaStoreApi};
use permissions::PermissionController;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SaveError {
    #[error("Saving requires the {0} permission")]
    PreconditionFailed(Capability),
    #[error("Save failed: {0}")]
    Failed(String),
}

/// Persists images into a named album.
///
/// Album existence is looked up on every save; nothing is cached between calls.
pub struct AlbumWriter {
    store: Arc<dyn MediaStoreApi>,
    permissions: Arc<PermissionController>,
}

impl AlbumWriter {
    pub fn new(store: Arc<dyn MediaStoreApi>, permissions: Arc<PermissionController>) -> Self {
        Self { store, permissions }
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn save(&self, image_uri: &str, album_name: &str) -> Result<Asset, SaveError> {
        if !self.permissions.query(Capability::LibraryWrite).is_granted() {
            return Err(SaveError::PreconditionFailed(Capability::LibraryWrite));
        }

        let asset = self
            .store
            .persist(image_uri)
            .await
            .map_err(|e| SaveError::Failed(format!("Failed to persist image: {}", e)))?;

        match self
            .store
            .get_album(album_name)
            .await
            .map_err(|e| SaveError::Failed(format!("Failed to look up album: {}", e)))?
        {
            None => {
                self.store
                    .create_album(album_name, &asset)
                    .await
                    .map_err(|e| SaveError::Failed(format!("Failed to create album: {}", e)))?;
                tracing::info!(album = album_name, asset_id = %asset.id, "Created album with first image");
            }
            Some(album) => {
                let added = self
                    .store
                    .add_to_album(&asset, &album)
                    .await
                    .map_err(|e| SaveError::Failed(format!("Failed to add to album: {}", e)))?;
                if added {
                    tracing::info!(album = album_name, asset_id = %asset.id, "Added image to album");
                } else {
                    tracing::debug!(album = album_name, asset_id = %asset.id, "Image already in album");
                }
            }
        }
        Ok(asset)
    }
}
