//! Cached, newest-first view of the device photo store.

use gallery_api::{Asset, MediaStoreApi, SortOrder};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Failed to load assets: {0}")]
    LoadFailed(String),
}

/// Ordered assets, newest first, unique by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetCollection {
    assets: Vec<Asset>,
}

impl AssetCollection {
    /// Sorts by `created_at` descending, drops repeated ids (first one wins) and
    /// caps the result at `page_size`.
    pub fn new(mut assets: Vec<Asset>, page_size: usize) -> Self {
        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = HashSet::new();
        assets.retain(|a| seen.insert(a.id.clone()));
        assets.truncate(page_size);
        Self { assets }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Asset> {
        self.assets.iter()
    }

    pub fn as_slice(&self) -> &[Asset] {
        &self.assets
    }
}

impl<'a> IntoIterator for &'a AssetCollection {
    type Item = &'a Asset;
    type IntoIter = std::slice::Iter<'a, Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.iter()
    }
}

/// Identifies one `reload` call, in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReloadTicket(u64);

impl ReloadTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Committed(AssetCollection),
    /// A later reload was issued while this one was in flight; its result was
    /// dropped without touching the cache.
    Superseded,
}

/// Sole owner of the cached [`AssetCollection`].
///
/// Reloads may overlap. Each one takes a ticket when it is issued and only the
/// holder of the newest ticket may commit, whatever order the store answers in.
pub struct AssetRepository {
    store: Arc<dyn MediaStoreApi>,
    issued: AtomicU64,
    cache: Mutex<AssetCollection>,
}

impl AssetRepository {
    pub fn new(store: Arc<dyn MediaStoreApi>) -> Self {
        Self {
            store,
            issued: AtomicU64::new(0),
            cache: Mutex::new(AssetCollection::empty()),
        }
    }

    /// Last committed collection; empty before the first successful load.
    pub fn current(&self) -> AssetCollection {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reserves the next ticket. Any reload holding an older ticket is stale from
    /// this point on.
    pub fn issue(&self) -> ReloadTicket {
        ReloadTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_latest(&self, ticket: ReloadTicket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    pub async fn reload(&self, page_size: usize) -> Result<ReloadOutcome, RepositoryError> {
        let ticket = self.issue();
        self.reload_with(ticket, page_size).await
    }

    /// Runs the load for an already issued ticket. A stale ticket yields
    /// `Superseded` even when the store call failed.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn reload_with(
        &self,
        ticket: ReloadTicket,
        page_size: usize,
    ) -> Result<ReloadOutcome, RepositoryError> {
        tracing::debug!(ticket = ticket.0, page_size, "Reload issued");
        let result = self.store.list_assets(page_size, SortOrder::NewestFirst).await;

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_latest(ticket) {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.issued.load(Ordering::SeqCst),
                ok = result.is_ok(),
                "Dropping superseded reload result"
            );
            return Ok(ReloadOutcome::Superseded);
        }
        let assets = result.map_err(|e| {
            tracing::warn!(ticket = ticket.0, error = %e, "Reload failed");
            RepositoryError::LoadFailed(e.to_string())
        })?;
        let collection = AssetCollection::new(assets, page_size);
        *cache = collection.clone();
        tracing::info!(ticket = ticket.0, assets = collection.len(), "Reload committed");
        Ok(ReloadOutcome::Committed(collection))
    }
}
