use gallery::{GalleryConfig, GalleryViewModel, Notice, ScreenState};
use gallery_api::{CaptureSource, PermissionState};
use image_gallery::FileCaptureUi;
use media_store::SqliteMediaStore;
use permissions::FileGrantStore;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::main]
async fn main() {
    let dir = TempDir::new().expect("temp dir");
    let shot = dir.path().join("shot.jpg");
    std::fs::write(&shot, b"\xFF\xD8\xFFjpeg").expect("write image");

    let store = Arc::new(
        SqliteMediaStore::new(&dir.path().join("gallery.sqlite"), &dir.path().join("media")).expect("store"),
    );
    let grants = Arc::new(FileGrantStore::in_dir(dir.path(), PermissionState::Granted));
    let vm = GalleryViewModel::new(
        grants,
        store.clone(),
        Arc::new(FileCaptureUi::new(Some(shot))),
        GalleryConfig::default(),
    );

    vm.start().await;
    assert_eq!(vm.snapshot().screen, ScreenState::Empty);

    vm.add_photo_requested(CaptureSource::Camera).await;
    vm.add_photo_requested(CaptureSource::Library).await;

    let snap = vm.snapshot();
    assert_eq!(snap.pending_notice, Some(Notice::info("Image saved to gallery!")));
    let grid = snap.screen.assets().expect("ready");
    assert_eq!(grid.len(), 2);

    let album = store
        .find_album("Image Gallery App")
        .expect("query album")
        .expect("album exists");
    assert_eq!(store.album_assets(&album.id).expect("members").len(), 2);
    assert_eq!(store.list_albums().expect("albums").len(), 1);
    for asset in grid {
        assert!(std::path::Path::new(&asset.uri).is_file());
    }
}
