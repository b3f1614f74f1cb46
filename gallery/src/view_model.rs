//! The gallery screen as a single state machine.
//!
//! Renderers read [`GallerySnapshot`]s (either [`GalleryViewModel::snapshot`] or the
//! watch stream from [`GalleryViewModel::subscribe`]) and call the intent methods.
//! Every failure ends up as the snapshot's pending notice; no intent returns an
//! error.

use crate::album_writer::AlbumWriter;
use crate::capture::CaptureService;
use crate::repository::{AssetCollection, AssetRepository, ReloadOutcome, ReloadTicket, RepositoryError};
use crate::{GalleryConfig, GalleryError};
use gallery_api::{
    Asset, Capability, CaptureOutcome, CaptureSource, CaptureUi, MediaStoreApi, PermissionState,
    PermissionsApi,
};
use permissions::PermissionController;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenState {
    Unauthorized,
    Loading,
    Ready(AssetCollection),
    Empty,
}

impl ScreenState {
    /// `Ready` or `Empty`: a load has finished and the grid can be shown.
    pub fn is_settled(&self) -> bool {
        matches!(self, ScreenState::Ready(_) | ScreenState::Empty)
    }

    pub fn assets(&self) -> Option<&AssetCollection> {
        match self {
            ScreenState::Ready(assets) => Some(assets),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerState {
    pub selected: Option<Asset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GallerySnapshot {
    pub screen: ScreenState,
    pub viewer: ViewerState,
    pub pending_notice: Option<Notice>,
}

impl Default for GallerySnapshot {
    fn default() -> Self {
        Self {
            screen: ScreenState::Unauthorized,
            viewer: ViewerState::default(),
            pending_notice: None,
        }
    }
}

impl GallerySnapshot {
    // The viewer only survives inside `Ready`, and only while its asset is
    // still part of the grid.
    fn set_screen(&mut self, screen: ScreenState) {
        let keep = match (&screen, &self.viewer.selected) {
            (ScreenState::Ready(assets), Some(selected)) => assets.contains(&selected.id),
            _ => false,
        };
        if !keep {
            self.viewer.selected = None;
        }
        self.screen = screen;
    }
}

fn access_required(source: CaptureSource) -> &'static str {
    match source {
        CaptureSource::Camera => "Permission to access camera is required!",
        CaptureSource::Library => "Permission to access camera roll is required!",
    }
}

fn capture_failed(source: CaptureSource) -> &'static str {
    match source {
        CaptureSource::Camera => "Failed to take photo",
        CaptureSource::Library => "Failed to pick image",
    }
}

pub struct GalleryViewModel {
    permissions: Arc<PermissionController>,
    assets: AssetRepository,
    capture: CaptureService,
    writer: AlbumWriter,
    config: GalleryConfig,
    state: watch::Sender<GallerySnapshot>,
    add_photo_flow: Mutex<()>,
}

impl GalleryViewModel {
    pub fn new(
        permissions: Arc<dyn PermissionsApi>,
        store: Arc<dyn MediaStoreApi>,
        capture_ui: Arc<dyn CaptureUi>,
        config: GalleryConfig,
    ) -> Self {
        let permissions = Arc::new(PermissionController::new(permissions));
        let (state, _) = watch::channel(GallerySnapshot::default());
        Self {
            assets: AssetRepository::new(store.clone()),
            capture: CaptureService::new(capture_ui, permissions.clone()),
            writer: AlbumWriter::new(store, permissions.clone()),
            permissions,
            config,
            state,
            add_photo_flow: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> GallerySnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GallerySnapshot> {
        self.state.subscribe()
    }

    pub fn repository(&self) -> &AssetRepository {
        &self.assets
    }

    /// Asks for photo library access and, once granted, loads the grid.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn start(&self) {
        tracing::info!("Starting gallery");
        self.request_library_access().await;
    }

    /// Re-prompts for library access after a denial, e.g. once the user has been
    /// sent to the system settings.
    pub async fn retry_permission(&self) {
        if self.state.borrow().screen != ScreenState::Unauthorized {
            tracing::debug!("Ignoring permission retry: already authorized");
            return;
        }
        self.request_library_access().await;
    }

    /// Reloads the grid from `Ready` or `Empty`. Overlapping refreshes are allowed;
    /// the last one issued wins.
    pub async fn refresh(&self) {
        if !self.state.borrow().screen.is_settled() {
            tracing::debug!("Ignoring refresh: grid not loaded");
            return;
        }
        self.reload().await;
    }

    pub fn open_image(&self, asset_id: &str) {
        self.state.send_if_modified(|snap| {
            let Some(asset) = snap.screen.assets().and_then(|a| a.get(asset_id)).cloned() else {
                tracing::debug!(asset_id, "Ignoring open: asset not in grid");
                return false;
            };
            if snap.viewer.selected.as_ref() == Some(&asset) {
                return false;
            }
            snap.viewer.selected = Some(asset);
            true
        });
    }

    pub fn close_viewer(&self) {
        self.state.send_if_modified(|snap| snap.viewer.selected.take().is_some());
    }

    pub fn dismiss_notice(&self) {
        self.state.send_if_modified(|snap| snap.pending_notice.take().is_some());
    }

    /// Runs the whole add-photo flow for the chosen source: permission, capture,
    /// save into the configured album and, after a confirmed save, a reload.
    ///
    /// Only one add-photo flow runs at a time; a second request while one is in
    /// flight is ignored.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn add_photo_requested(&self, source: CaptureSource) {
        if !self.state.borrow().screen.is_settled() {
            tracing::debug!(%source, "Ignoring add photo: grid not loaded");
            return;
        }
        let Ok(_flow) = self.add_photo_flow.try_lock() else {
            tracing::debug!(%source, "Ignoring add photo: another capture is in progress");
            return;
        };

        let capability = source.required_capability();
        match self.permissions.ensure(capability).await {
            Ok(PermissionState::Granted) => {}
            Ok(_) => {
                self.post_notice(Notice::error(access_required(source)));
                return;
            }
            Err(e) => {
                self.report(e.into());
                return;
            }
        }

        let image = match self.capture.capture(source, &self.config.capture).await {
            Ok(CaptureOutcome::Captured(image)) => image,
            Ok(CaptureOutcome::Cancelled) => return,
            Err(e) => {
                self.report_as(e.into(), capture_failed(source));
                return;
            }
        };

        match self.permissions.ensure(Capability::LibraryWrite).await {
            Ok(PermissionState::Granted) => {}
            Ok(_) => {
                self.post_notice(Notice::error("Permission to save to media library is required!"));
                return;
            }
            Err(e) => {
                self.report(e.into());
                return;
            }
        }

        match self.writer.save(&image.uri, &self.config.album_name).await {
            Ok(asset) => {
                tracing::info!(asset_id = %asset.id, album = %self.config.album_name, "Image saved");
                self.post_notice(Notice::info("Image saved to gallery!"));
                self.reload().await;
            }
            Err(e) => self.report(e.into()),
        }
    }

    async fn request_library_access(&self) {
        match self.permissions.request(Capability::LibraryRead).await {
            Ok(PermissionState::Granted) => {
                self.state.send_if_modified(|snap| {
                    // A retry never knocks a loaded grid back to the spinner.
                    if snap.screen.is_settled() {
                        return false;
                    }
                    snap.set_screen(ScreenState::Loading);
                    true
                });
                self.reload().await;
            }
            Ok(_) => {
                tracing::info!("Photo library access denied");
                self.state.send_if_modified(|snap| {
                    if snap.screen == ScreenState::Unauthorized {
                        return false;
                    }
                    snap.set_screen(ScreenState::Unauthorized);
                    true
                });
            }
            Err(e) => self.report(e.into()),
        }
    }

    async fn reload(&self) {
        let ticket = self.assets.issue();
        match self.assets.reload_with(ticket, self.config.page_size).await {
            Ok(ReloadOutcome::Committed(collection)) => self.commit_collection(ticket, collection),
            Ok(ReloadOutcome::Superseded) => {}
            Err(e) => self.commit_failure(ticket, e),
        }
    }

    fn commit_collection(&self, ticket: ReloadTicket, collection: AssetCollection) {
        self.state.send_if_modified(|snap| {
            if !self.assets.is_latest(ticket) {
                tracing::debug!(ticket = ticket.value(), "Dropping superseded grid update");
                return false;
            }
            let screen = if collection.is_empty() {
                ScreenState::Empty
            } else {
                ScreenState::Ready(collection)
            };
            if snap.screen == screen {
                return false;
            }
            snap.set_screen(screen);
            true
        });
    }

    fn commit_failure(&self, ticket: ReloadTicket, err: RepositoryError) {
        if !self.assets.is_latest(ticket) {
            return;
        }
        let err = GalleryError::from(err);
        self.log_failure(&err);
        let notice = Notice::error(err.user_message());
        self.state.send_modify(|snap| {
            // With nothing loaded yet there is no previous grid to fall back to.
            if snap.screen == ScreenState::Loading {
                snap.set_screen(ScreenState::Empty);
            }
            snap.pending_notice = Some(notice);
        });
    }

    fn report(&self, err: GalleryError) {
        let message = err.user_message();
        self.report_as(err, message);
    }

    fn report_as(&self, err: GalleryError, message: impl Into<String>) {
        self.log_failure(&err);
        self.post_notice(Notice::error(message));
    }

    fn log_failure(&self, err: &GalleryError) {
        if err.is_precondition() {
            tracing::error!(error = %err, code = err.code(), "Operation invoked without its permission");
        } else {
            tracing::warn!(error = %err, code = err.code(), "Gallery operation failed");
        }
    }

    fn post_notice(&self, notice: Notice) {
        self.state.send_modify(|snap| snap.pending_notice = Some(notice));
    }
}
