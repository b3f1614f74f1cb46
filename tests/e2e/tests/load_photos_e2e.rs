use chrono::{Duration, Utc};
use gallery::{GalleryConfig, GalleryViewModel};
use gallery_api::{Asset, PermissionState};
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
    let now = Utc::now();
    for i in 0..150 {
        let asset = Asset {
            id: format!("photo-{}", i),
            uri: format!("/photos/{}.jpg", i),
            created_at: now - Duration::minutes(i),
        };
        store.insert_asset(&asset).expect("insert");
    }

    let grants = Arc::new(FileGrantStore::in_dir(dir.path(), PermissionState::Granted));
    let vm = GalleryViewModel::new(
        grants,
        store,
        Arc::new(FileCaptureUi::new(None)),
        GalleryConfig::default(),
    );
    vm.start().await;

    let snap = vm.snapshot();
    let grid = snap.screen.assets().expect("ready");
    assert_eq!(grid.len(), 100);
    assert_eq!(grid.as_slice()[0].id, "photo-0");
    assert_eq!(grid.as_slice()[99].id, "photo-99");

    vm.open_image("photo-5");
    vm.open_image("photo-9");
    assert_eq!(vm.snapshot().viewer.selected.map(|a| a.id), Some("photo-9".to_string()));
    vm.close_viewer();
    assert!(vm.snapshot().viewer.selected.is_none());
}
