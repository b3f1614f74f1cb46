//! SQLite-backed photo store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_api::{Album, Asset, MediaStoreApi, PlatformError, SortOrder};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database Error: {0}")]
    DatabaseError(String),
    #[error("IO Error: {0}")]
    Io(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Other Error: {0}")]
    Other(String),
}

impl From<StoreError> for PlatformError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(msg) => PlatformError::Io(msg),
            other => PlatformError::Store(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct SqliteMediaStore {
    conn: Arc<Mutex<Connection>>,
    media_dir: PathBuf,
}

fn apply_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let migrations = Migrations::new(vec![
        M::up(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);\
             INSERT INTO schema_version (version) VALUES (1);\
             CREATE TABLE IF NOT EXISTS assets (\
                 seq INTEGER PRIMARY KEY,\
                 id TEXT NOT NULL UNIQUE,\
                 uri TEXT NOT NULL,\
                 created_at INTEGER NOT NULL\
             );",
        ),
        M::up(
            "CREATE TABLE IF NOT EXISTS albums (\
                 seq INTEGER PRIMARY KEY,\
                 id TEXT NOT NULL UNIQUE,\
                 name TEXT NOT NULL UNIQUE\
             );\
             CREATE TABLE IF NOT EXISTS album_assets (\
                 album_id TEXT NOT NULL,\
                 asset_id TEXT NOT NULL,\
                 PRIMARY KEY (album_id, asset_id),\
                 FOREIGN KEY(album_id) REFERENCES albums(id) ON DELETE CASCADE,\
                 FOREIGN KEY(asset_id) REFERENCES assets(id) ON DELETE CASCADE\
             );\
             UPDATE schema_version SET version = 2;",
        ),
        M::up(
            "CREATE INDEX IF NOT EXISTS idx_assets_created_at ON assets (created_at);\
             CREATE INDEX IF NOT EXISTS idx_album_assets_asset_id ON album_assets (asset_id);\
             UPDATE schema_version SET version = 3;",
        ),
    ]);
    migrations
        .to_latest(conn)
        .map_err(|e| StoreError::DatabaseError(format!("Failed to apply migrations: {}", e)))?;
    Ok(())
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> StoreError + '_ {
    move |e| StoreError::DatabaseError(format!("{}: {}", context, e))
}

fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
}

fn row_to_asset(row: &rusqlite::Row<'_>) -> rusqlite::Result<Asset> {
    let ms: i64 = row.get(2)?;
    Ok(Asset {
        id: row.get(0)?,
        uri: row.get(1)?,
        created_at: ms_to_datetime(ms),
    })
}

/// Accepts plain paths as well as `file://` URIs.
fn source_path(image_uri: &str) -> PathBuf {
    PathBuf::from(image_uri.strip_prefix("file://").unwrap_or(image_uri))
}

impl SqliteMediaStore {
    pub fn new(db_path: &Path, media_dir: &Path) -> Result<Self, StoreError> {
        let mut conn = Connection::open(db_path)
            .map_err(|e| StoreError::DatabaseError(format!("Failed to open database: {}", e)))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err("Failed to enable foreign keys"))?;
        apply_migrations(&mut conn)?;
        std::fs::create_dir_all(media_dir).map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(SqliteMediaStore {
            conn: Arc::new(Mutex::new(conn)),
            media_dir: media_dir.to_path_buf(),
        })
    }

    pub fn lock_conn(&self) -> Result<std::sync::MutexGuard<Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("Poisoned lock".into()))
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Registers an asset that already lives somewhere on disk. Existing ids are kept.
    pub fn insert_asset(&self, asset: &Asset) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO assets (seq, id, uri, created_at)
                 VALUES ((SELECT COALESCE(MAX(seq), 0) + 1 FROM assets), ?1, ?2, ?3)",
                params![asset.id, asset.uri, asset.created_at.timestamp_millis()],
            )
            .map_err(db_err("Failed to insert asset"))?;
        Ok(changed > 0)
    }

    /// Copies the image into the media directory and records it as a new asset.
    pub fn persist_file(&self, image_uri: &str) -> Result<Asset, StoreError> {
        let source = source_path(image_uri);
        if !source.is_file() {
            return Err(StoreError::NotFound(format!("No image at {}", source.display())));
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(db_err("Failed to start transaction"))?;
        let mut seq: i64 = tx
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM assets", [], |row| row.get(0))
            .map_err(db_err("Failed to allocate asset id"))?;
        // Registered assets may already carry an `asset-N` id.
        let id = loop {
            let candidate = format!("asset-{}", seq);
            let taken: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM assets WHERE id = ?1)",
                    params![candidate],
                    |row| row.get(0),
                )
                .map_err(db_err("Failed to allocate asset id"))?;
            if !taken {
                break candidate;
            }
            seq += 1;
        };

        let file_name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.clone(),
        };
        let dest = self.media_dir.join(file_name);
        std::fs::copy(&source, &dest).map_err(|e| StoreError::Io(e.to_string()))?;

        let asset = Asset {
            id,
            uri: dest.to_string_lossy().to_string(),
            created_at: Utc::now(),
        };
        let inserted = tx
            .execute(
                "INSERT INTO assets (seq, id, uri, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![seq, asset.id, asset.uri, asset.created_at.timestamp_millis()],
            )
            .map_err(db_err("Failed to insert asset"))
            .and_then(|_| tx.commit().map_err(db_err("Failed to commit asset")));
        if let Err(e) = inserted {
            let _ = std::fs::remove_file(&dest);
            return Err(e);
        }

        tracing::info!(asset_id = %asset.id, source = %source.display(), "Persisted image");
        Ok(ms_rounded(asset))
    }

    pub fn load_assets(&self, page_size: usize, order: SortOrder) -> Result<Vec<Asset>, StoreError> {
        let start = std::time::Instant::now();
        let sql = match order {
            SortOrder::NewestFirst => {
                "SELECT id, uri, created_at FROM assets ORDER BY created_at DESC, seq DESC LIMIT ?1"
            }
            SortOrder::OldestFirst => {
                "SELECT id, uri, created_at FROM assets ORDER BY created_at ASC, seq ASC LIMIT ?1"
            }
        };
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(db_err("Failed to prepare statement"))?;
        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], row_to_asset)
            .map_err(db_err("Failed to query assets"))?;

        let mut assets = Vec::new();
        for row in rows {
            assets.push(row.map_err(db_err("Failed to read asset row"))?);
        }
        tracing::debug!("store_load_time_ms" = %start.elapsed().as_millis(), "assets" = assets.len());
        Ok(assets)
    }

    pub fn get_asset(&self, id: &str) -> Result<Option<Asset>, StoreError> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, uri, created_at FROM assets WHERE id = ?1",
            params![id],
            row_to_asset,
        )
        .optional()
        .map_err(db_err("Failed to query asset"))
    }

    pub fn asset_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))
            .map_err(db_err("Failed to count assets"))?;
        Ok(count as usize)
    }

    pub fn find_album(&self, name: &str) -> Result<Option<Album>, StoreError> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name FROM albums WHERE name = ?1",
            params![name],
            |row| {
                Ok(Album {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(db_err("Failed to query album"))
    }

    /// Creates the album and its first membership in one transaction.
    pub fn create_album_seeded(&self, name: &str, seed_id: &str) -> Result<Album, StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(db_err("Failed to start transaction"))?;
        let seq: i64 = tx
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM albums", [], |row| row.get(0))
            .map_err(db_err("Failed to allocate album id"))?;
        let album = Album {
            id: format!("album-{}", seq),
            name: name.to_string(),
        };
        tx.execute(
            "INSERT INTO albums (seq, id, name) VALUES (?1, ?2, ?3)",
            params![seq, album.id, album.name],
        )
        .map_err(db_err("Failed to create album"))?;
        tx.execute(
            "INSERT INTO album_assets (album_id, asset_id) VALUES (?1, ?2)",
            params![album.id, seed_id],
        )
        .map_err(db_err("Failed to seed album"))?;
        tx.commit().map_err(db_err("Failed to commit album"))?;
        tracing::info!(album = %album.name, album_id = %album.id, "Created album");
        Ok(album)
    }

    /// Returns `false` when the asset already was a member.
    pub fn add_to_album_by_id(&self, asset_id: &str, album_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO album_assets (album_id, asset_id) VALUES (?1, ?2)",
                params![album_id, asset_id],
            )
            .map_err(db_err("Failed to add asset to album"))?;
        Ok(changed > 0)
    }

    pub fn album_assets(&self, album_id: &str) -> Result<Vec<Asset>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT a.id, a.uri, a.created_at FROM assets a
                 JOIN album_assets aa ON a.id = aa.asset_id
                 WHERE aa.album_id = ?1
                 ORDER BY a.created_at DESC, a.seq DESC",
            )
            .map_err(db_err("Failed to prepare statement"))?;
        let rows = stmt
            .query_map(params![album_id], row_to_asset)
            .map_err(db_err("Failed to query album assets"))?;
        let mut assets = Vec::new();
        for row in rows {
            assets.push(row.map_err(db_err("Failed to read asset row"))?);
        }
        Ok(assets)
    }

    pub fn list_albums(&self) -> Result<Vec<Album>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name FROM albums ORDER BY seq")
            .map_err(db_err("Failed to prepare statement"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Album {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .map_err(db_err("Failed to query albums"))?;
        let mut albums = Vec::new();
        for row in rows {
            albums.push(row.map_err(db_err("Failed to read album row"))?);
        }
        Ok(albums)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(SqliteMediaStore) -> Result<T, StoreError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?
    }
}

/// Timestamps are stored with millisecond precision; hand back what a reload
/// would return.
fn ms_rounded(mut asset: Asset) -> Asset {
    asset.created_at = ms_to_datetime(asset.created_at.timestamp_millis());
    asset
}

#[async_trait]
impl MediaStoreApi for SqliteMediaStore {
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    async fn list_assets(&self, page_size: usize, order: SortOrder) -> Result<Vec<Asset>, PlatformError> {
        Ok(self.blocking(move |s| s.load_assets(page_size, order)).await?)
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    async fn persist(&self, image_uri: &str) -> Result<Asset, PlatformError> {
        let uri = image_uri.to_string();
        Ok(self.blocking(move |s| s.persist_file(&uri)).await?)
    }

    async fn get_album(&self, name: &str) -> Result<Option<Album>, PlatformError> {
        let name = name.to_string();
        Ok(self.blocking(move |s| s.find_album(&name)).await?)
    }

    async fn create_album(&self, name: &str, seed: &Asset) -> Result<Album, PlatformError> {
        let name = name.to_string();
        let seed_id = seed.id.clone();
        Ok(self.blocking(move |s| s.create_album_seeded(&name, &seed_id)).await?)
    }

    async fn add_to_album(&self, asset: &Asset, album: &Album) -> Result<bool, PlatformError> {
        let asset_id = asset.id.clone();
        let album_id = album.id.clone();
        Ok(self.blocking(move |s| s.add_to_album_by_id(&asset_id, &album_id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_path_strips_file_scheme() {
        assert_eq!(source_path("file:///tmp/a.jpg"), PathBuf::from("/tmp/a.jpg"));
        assert_eq!(source_path("/tmp/a.jpg"), PathBuf::from("/tmp/a.jpg"));
    }

    #[test]
    fn test_ms_to_datetime_roundtrip() {
        let now = Utc::now();
        let back = ms_to_datetime(now.timestamp_millis());
        assert_eq!(back.timestamp_millis(), now.timestamp_millis());
    }
}
