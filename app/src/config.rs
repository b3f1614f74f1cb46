use gallery::GalleryConfig;
use gallery_api::{CaptureConfig, PermissionState, DEFAULT_ALBUM_NAME, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub page_size: usize,
    pub album_name: String,
    pub capture_quality: f32,
    pub capture_allows_editing: bool,
    /// Answer given for a capability with no recorded grant.
    pub default_permission: PermissionState,
    pub debug_console: bool,
    pub data_path: PathBuf,
}

#[derive(Default)]
pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub page_size: Option<usize>,
    pub album_name: Option<String>,
    pub data_path: Option<PathBuf>,
    pub debug_console: bool,
}

fn default_data_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".image_gallery")
}

fn default_config_path() -> PathBuf {
    default_data_path().join("config")
}

impl Default for AppConfig {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        Self {
            log_level: "info".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            album_name: DEFAULT_ALBUM_NAME.to_string(),
            capture_quality: capture.quality,
            capture_allows_editing: capture.allows_editing,
            default_permission: PermissionState::Granted,
            debug_console: false,
            data_path: default_data_path(),
        }
    }
}

fn parse_permission(value: &str) -> Option<PermissionState> {
    match value.to_ascii_lowercase().as_str() {
        "granted" => Some(PermissionState::Granted),
        "denied" => Some(PermissionState::Denied),
        "unknown" => Some(PermissionState::Unknown),
        _ => None,
    }
}

impl AppConfig {
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(default_config_path);
        let cfg = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .build()
            .unwrap_or_default();
        let defaults = Self::default();

        let log_level = cfg.get_string("log_level").unwrap_or(defaults.log_level);
        let page_size = cfg
            .get_int("page_size")
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(defaults.page_size);
        let album_name = cfg
            .get_string("album_name")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.album_name);
        let capture_quality = cfg
            .get_float("capture_quality")
            .map(|q| q.clamp(0.0, 1.0) as f32)
            .unwrap_or(defaults.capture_quality);
        let capture_allows_editing = cfg
            .get_bool("capture_allows_editing")
            .unwrap_or(defaults.capture_allows_editing);
        let default_permission = cfg
            .get_string("default_permission")
            .ok()
            .and_then(|s| parse_permission(&s))
            .unwrap_or(defaults.default_permission);
        let debug_console = cfg.get_bool("debug_console").unwrap_or(defaults.debug_console);
        let data_path = cfg
            .get_string("data_path")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_path);

        Self {
            log_level,
            page_size,
            album_name,
            capture_quality,
            capture_allows_editing,
            default_permission,
            debug_console,
            data_path,
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(p) = ov.page_size {
            self.page_size = p.max(1);
        }
        if let Some(a) = &ov.album_name {
            self.album_name = a.clone();
        }
        if let Some(d) = &ov.data_path {
            self.data_path = d.clone();
        }
        if ov.debug_console {
            self.debug_console = true;
        }
        self
    }

    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<()> {
        let path = path.unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path.join("gallery.sqlite")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_path.join("media")
    }

    pub fn gallery_config(&self) -> GalleryConfig {
        GalleryConfig {
            page_size: self.page_size,
            album_name: self.album_name.clone(),
            capture: CaptureConfig {
                allows_editing: self.capture_allows_editing,
                quality: self.capture_quality,
                ..CaptureConfig::default()
            },
        }
    }
}
