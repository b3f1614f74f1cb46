use chrono::{Duration, Utc};
use gallery_api::{Asset, MediaStoreApi, PlatformError, SortOrder};
use media_store::{SqliteMediaStore, StoreError};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::PathBuf;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> SqliteMediaStore {
    SqliteMediaStore::new(&dir.path().join("gallery.sqlite"), &dir.path().join("media")).unwrap()
}

fn write_image(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"\xFF\xD8\xFFjpeg").unwrap();
    path
}

fn sample_asset(id: &str, minutes_ago: i64) -> Asset {
    Asset {
        id: id.to_string(),
        uri: format!("/photos/{}.jpg", id),
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

#[test]
fn test_new_applies_migrations() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("gallery.sqlite");
    let _ = SqliteMediaStore::new(&db, &dir.path().join("media")).unwrap();
    let conn = Connection::open(&db).unwrap();
    let version: i64 = conn
        .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, 3);
    assert!(dir.path().join("media").is_dir());
}

#[test]
fn test_persist_copies_file_into_media_dir() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let src = write_image(&dir, "shot.jpg");

    let asset = store.persist_file(src.to_str().unwrap()).unwrap();
    assert_eq!(asset.id, "asset-1");
    let stored = PathBuf::from(&asset.uri);
    assert!(stored.starts_with(store.media_dir()));
    assert_eq!(std::fs::read(&stored).unwrap(), std::fs::read(&src).unwrap());
    assert_eq!(store.get_asset("asset-1").unwrap(), Some(asset));
}

#[test]
fn test_persist_accepts_file_uri() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let src = write_image(&dir, "shot.png");
    let uri = format!("file://{}", src.display());
    let asset = store.persist_file(&uri).unwrap();
    assert!(asset.uri.ends_with(".png"));
}

#[test]
fn test_persist_missing_source_fails_without_row() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let err = store.persist_file("/definitely/not/here.jpg").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert_eq!(store.asset_count().unwrap(), 0);
}

#[test]
fn test_load_assets_newest_first_with_page_cap() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for i in 0..5 {
        store.insert_asset(&sample_asset(&format!("p{}", i), i)).unwrap();
    }

    let page = store.load_assets(3, SortOrder::NewestFirst).unwrap();
    let ids: Vec<_> = page.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p1", "p2"]);

    let oldest = store.load_assets(2, SortOrder::OldestFirst).unwrap();
    let ids: Vec<_> = oldest.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["p4", "p3"]);
}

#[test]
fn test_insert_asset_ignores_existing_id() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert!(store.insert_asset(&sample_asset("dup", 1)).unwrap());
    assert!(!store.insert_asset(&sample_asset("dup", 2)).unwrap());
    let ids: HashSet<_> = store
        .load_assets(10, SortOrder::NewestFirst)
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids.len(), 1);
}

#[test]
fn test_album_create_and_set_semantic_add() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let first = store.persist_file(write_image(&dir, "1.jpg").to_str().unwrap()).unwrap();
    let second = store.persist_file(write_image(&dir, "2.jpg").to_str().unwrap()).unwrap();

    assert!(store.find_album("Trip").unwrap().is_none());
    let album = store.create_album_seeded("Trip", &first.id).unwrap();
    assert_eq!(store.find_album("Trip").unwrap(), Some(album.clone()));

    assert!(store.add_to_album_by_id(&second.id, &album.id).unwrap());
    assert!(!store.add_to_album_by_id(&second.id, &album.id).unwrap());
    assert!(!store.add_to_album_by_id(&first.id, &album.id).unwrap());

    let members = store.album_assets(&album.id).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(store.list_albums().unwrap(), vec![album]);
}

#[test]
fn test_failed_seed_leaves_no_album() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    // The seed asset does not exist, so the membership insert violates the
    // foreign key and the whole transaction rolls back.
    assert!(store.create_album_seeded("Ghost", "asset-404").is_err());
    assert!(store.find_album("Ghost").unwrap().is_none());
    assert!(store.list_albums().unwrap().is_empty());
}

#[tokio::test]
async fn test_port_roundtrip_through_trait() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let port: &dyn MediaStoreApi = &store;
    let src = write_image(&dir, "cam.jpg");

    let asset = port.persist(src.to_str().unwrap()).await.unwrap();
    assert!(port.get_album("Image Gallery App").await.unwrap().is_none());
    let album = port.create_album("Image Gallery App", &asset).await.unwrap();
    assert!(!port.add_to_album(&asset, &album).await.unwrap());

    let listed = port.list_assets(100, SortOrder::NewestFirst).await.unwrap();
    assert_eq!(listed, vec![asset]);
}

#[tokio::test]
async fn test_port_maps_missing_source_to_store_error() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let err = MediaStoreApi::persist(&store, "/nope.jpg").await.unwrap_err();
    assert!(matches!(err, PlatformError::Store(_)));
}

#[test]
fn test_persist_skips_ids_taken_by_registered_assets() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert!(store.insert_asset(&sample_asset("asset-2", 5)).unwrap());

    let mut ids = HashSet::new();
    for i in 0..3 {
        let src = write_image(&dir, &format!("{}.jpg", i));
        let asset = store.persist_file(src.to_str().unwrap()).unwrap();
        assert_ne!(asset.id, "asset-2");
        assert!(ids.insert(asset.id));
    }
    assert_eq!(store.asset_count().unwrap(), 4);
}
