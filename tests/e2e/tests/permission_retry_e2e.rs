use gallery::{GalleryConfig, GalleryViewModel, ScreenState};
use gallery_api::{Capability, PermissionState};
use image_gallery::FileCaptureUi;
use media_store::SqliteMediaStore;
use permissions::FileGrantStore;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::main]
async fn main() {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(
        SqliteMediaStore::new(&dir.path().join("gallery.sqlite"), &dir.path().join("media")).expect("store"),
    );
    let grants = Arc::new(FileGrantStore::in_dir(dir.path(), PermissionState::Granted));
    grants.revoke(Capability::LibraryRead).expect("revoke");

    let vm = GalleryViewModel::new(
        grants.clone(),
        store,
        Arc::new(FileCaptureUi::new(None)),
        GalleryConfig::default(),
    );
    vm.start().await;
    assert_eq!(vm.snapshot().screen, ScreenState::Unauthorized);

    grants.grant(Capability::LibraryRead).expect("grant");
    vm.retry_permission().await;
    assert_eq!(vm.snapshot().screen, ScreenState::Empty);
}
