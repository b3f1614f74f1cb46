//! In-memory doubles for the platform ports, shared by the crates' tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use gallery_api::{
    Album, Asset, Capability, CaptureConfig, CaptureOutcome, CaptureUi, CapturedImage, MediaStoreApi,
    PermissionState, PermissionsApi, PlatformError, SortOrder,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_else(Utc::now)
}

/// `count` assets with ids `a1..a{count}`, `a1` being the newest.
pub fn sample_assets(count: usize) -> Vec<Asset> {
    (1..=count)
        .map(|i| Asset {
            id: format!("a{}", i),
            uri: format!("file:///photos/a{}.jpg", i),
            created_at: base_time() - Duration::minutes(i as i64),
        })
        .collect()
}

/// Permission dialog that answers from a per-capability table.
pub struct FakePermissions {
    decisions: Mutex<HashMap<Capability, PermissionState>>,
    failure: Mutex<Option<PlatformError>>,
    requests: Mutex<HashMap<Capability, usize>>,
}

impl FakePermissions {
    pub fn with_default(state: PermissionState) -> Self {
        let decisions = Capability::ALL.iter().map(|c| (*c, state)).collect();
        Self {
            decisions: Mutex::new(decisions),
            failure: Mutex::new(None),
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn granting_all() -> Self {
        Self::with_default(PermissionState::Granted)
    }

    pub fn denying_all() -> Self {
        Self::with_default(PermissionState::Denied)
    }

    pub fn set_decision(&self, capability: Capability, state: PermissionState) {
        lock(&self.decisions).insert(capability, state);
    }

    /// Every request fails with `err` until [`FakePermissions::clear_failure`].
    pub fn fail_with(&self, err: PlatformError) {
        *lock(&self.failure) = Some(err);
    }

    pub fn clear_failure(&self) {
        *lock(&self.failure) = None;
    }

    pub fn request_count(&self, capability: Capability) -> usize {
        lock(&self.requests).get(&capability).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PermissionsApi for FakePermissions {
    async fn request(&self, capability: Capability) -> Result<PermissionState, PlatformError> {
        *lock(&self.requests).entry(capability).or_insert(0) += 1;
        if let Some(err) = lock(&self.failure).clone() {
            return Err(err);
        }
        Ok(lock(&self.decisions).get(&capability).copied().unwrap_or_default())
    }

    async fn query(&self, capability: Capability) -> Result<PermissionState, PlatformError> {
        Ok(lock(&self.decisions).get(&capability).copied().unwrap_or_default())
    }
}

#[derive(Default)]
struct StoreState {
    assets: Vec<Asset>,
    albums: Vec<(Album, BTreeSet<String>)>,
    next_id: usize,
    fail_list: Option<PlatformError>,
    fail_persist: Option<PlatformError>,
    fail_albums: Option<PlatformError>,
    list_calls: usize,
}

/// Photo store held in memory.
///
/// `list_assets` snapshots the contents when it is called and only then waits on
/// any gate installed with [`InMemoryMediaStore::hold_next_list`], so a held call
/// resolves with data that may have gone stale in the meantime.
#[derive(Default)]
pub struct InMemoryMediaStore {
    state: Mutex<StoreState>,
    gates: Mutex<VecDeque<Option<oneshot::Receiver<()>>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assets(assets: Vec<Asset>) -> Self {
        let store = Self::new();
        for asset in assets {
            store.insert_raw(asset);
        }
        store
    }

    /// Inserts without any id check, to simulate a store returning duplicates.
    pub fn insert_raw(&self, asset: Asset) {
        let mut state = lock(&self.state);
        state.next_id += 1;
        state.assets.push(asset);
    }

    pub fn asset_count(&self) -> usize {
        lock(&self.state).assets.len()
    }

    pub fn list_calls(&self) -> usize {
        lock(&self.state).list_calls
    }

    pub fn fail_lists(&self, err: Option<PlatformError>) {
        lock(&self.state).fail_list = err;
    }

    pub fn fail_persists(&self, err: Option<PlatformError>) {
        lock(&self.state).fail_persist = err;
    }

    pub fn fail_albums(&self, err: Option<PlatformError>) {
        lock(&self.state).fail_albums = err;
    }

    pub fn album(&self, name: &str) -> Option<Album> {
        lock(&self.state)
            .albums
            .iter()
            .find(|(a, _)| a.name == name)
            .map(|(a, _)| a.clone())
    }

    pub fn album_count(&self) -> usize {
        lock(&self.state).albums.len()
    }

    pub fn album_members(&self, name: &str) -> Vec<String> {
        lock(&self.state)
            .albums
            .iter()
            .find(|(a, _)| a.name == name)
            .map(|(_, members)| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes the next not-yet-gated `list_assets` call wait until the returned
    /// sender fires (or is dropped).
    pub fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.gates).push_back(Some(rx));
        tx
    }

    /// Lets the next `list_assets` call through immediately. Used to line up gates
    /// with call order.
    pub fn pass_next_list(&self) {
        lock(&self.gates).push_back(None);
    }
}

#[async_trait]
impl MediaStoreApi for InMemoryMediaStore {
    async fn list_assets(&self, page_size: usize, order: SortOrder) -> Result<Vec<Asset>, PlatformError> {
        let result = {
            let mut state = lock(&self.state);
            state.list_calls += 1;
            match &state.fail_list {
                Some(err) => Err(err.clone()),
                None => {
                    let mut assets = state.assets.clone();
                    assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    if order == SortOrder::OldestFirst {
                        assets.reverse();
                    }
                    assets.truncate(page_size);
                    Ok(assets)
                }
            }
        };
        let gate = lock(&self.gates).pop_front().flatten();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        result
    }

    async fn persist(&self, image_uri: &str) -> Result<Asset, PlatformError> {
        let mut state = lock(&self.state);
        if let Some(err) = &state.fail_persist {
            return Err(err.clone());
        }
        if image_uri.is_empty() {
            return Err(PlatformError::Store("empty image uri".into()));
        }
        state.next_id += 1;
        let created_at = state
            .assets
            .iter()
            .map(|a| a.created_at)
            .max()
            .map(|t| t + Duration::seconds(1))
            .unwrap_or_else(base_time);
        let asset = Asset {
            id: format!("asset-{}", state.next_id),
            uri: image_uri.to_string(),
            created_at,
        };
        state.assets.push(asset.clone());
        Ok(asset)
    }

    async fn get_album(&self, name: &str) -> Result<Option<Album>, PlatformError> {
        Ok(self.album(name))
    }

    async fn create_album(&self, name: &str, seed: &Asset) -> Result<Album, PlatformError> {
        let mut state = lock(&self.state);
        if let Some(err) = &state.fail_albums {
            return Err(err.clone());
        }
        if state.albums.iter().any(|(a, _)| a.name == name) {
            return Err(PlatformError::Store(format!("album {} already exists", name)));
        }
        let album = Album {
            id: format!("album-{}", state.albums.len() + 1),
            name: name.to_string(),
        };
        let members = BTreeSet::from([seed.id.clone()]);
        state.albums.push((album.clone(), members));
        Ok(album)
    }

    async fn add_to_album(&self, asset: &Asset, album: &Album) -> Result<bool, PlatformError> {
        let mut state = lock(&self.state);
        if let Some(err) = &state.fail_albums {
            return Err(err.clone());
        }
        let (_, members) = state
            .albums
            .iter_mut()
            .find(|(a, _)| a.id == album.id)
            .ok_or_else(|| PlatformError::Store(format!("album {} not found", album.id)))?;
        Ok(members.insert(asset.id.clone()))
    }
}

/// Camera and picker that replay queued outcomes; an empty queue means the user
/// cancelled.
#[derive(Default)]
pub struct ScriptedCapture {
    photos: Mutex<VecDeque<Result<CaptureOutcome, PlatformError>>>,
    picks: Mutex<VecDeque<Result<CaptureOutcome, PlatformError>>>,
    configs: Mutex<Vec<CaptureConfig>>,
    photo_calls: Mutex<usize>,
    pick_calls: Mutex<usize>,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_photo(&self, outcome: Result<CaptureOutcome, PlatformError>) {
        lock(&self.photos).push_back(outcome);
    }

    pub fn push_pick(&self, outcome: Result<CaptureOutcome, PlatformError>) {
        lock(&self.picks).push_back(outcome);
    }

    pub fn push_photo_uri(&self, uri: &str) {
        self.push_photo(Ok(CaptureOutcome::Captured(CapturedImage { uri: uri.to_string() })));
    }

    pub fn push_pick_uri(&self, uri: &str) {
        self.push_pick(Ok(CaptureOutcome::Captured(CapturedImage { uri: uri.to_string() })));
    }

    pub fn photo_calls(&self) -> usize {
        *lock(&self.photo_calls)
    }

    pub fn pick_calls(&self) -> usize {
        *lock(&self.pick_calls)
    }

    pub fn last_config(&self) -> Option<CaptureConfig> {
        lock(&self.configs).last().cloned()
    }
}

#[async_trait]
impl CaptureUi for ScriptedCapture {
    async fn pick_image(&self, config: &CaptureConfig) -> Result<CaptureOutcome, PlatformError> {
        *lock(&self.pick_calls) += 1;
        lock(&self.configs).push(config.clone());
        lock(&self.picks).pop_front().unwrap_or(Ok(CaptureOutcome::Cancelled))
    }

    async fn take_photo(&self, config: &CaptureConfig) -> Result<CaptureOutcome, PlatformError> {
        *lock(&self.photo_calls) += 1;
        lock(&self.configs).push(config.clone());
        lock(&self.photos).pop_front().unwrap_or(Ok(CaptureOutcome::Cancelled))
    }
}
