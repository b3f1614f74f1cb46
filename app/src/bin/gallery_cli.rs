use clap::{ArgGroup, Parser, Subcommand};
use gallery::{GallerySnapshot, GalleryViewModel, NoticeKind, ScreenState};
use gallery_api::{Capability, CaptureSource, PermissionsApi};
use image_gallery::{AppConfig, AppConfigOverrides, FileCaptureUi};
use media_store::SqliteMediaStore;
use permissions::FileGrantStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gallery_cli", author, version, about = "Image gallery command line")]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Override the number of images loaded per reload
    #[arg(long)]
    page_size: Option<usize>,
    /// Override the album new images are saved into
    #[arg(long)]
    album_name: Option<String>,
    /// Override the data directory (database, media, grants, logs)
    #[arg(long)]
    data_path: Option<PathBuf>,
    /// Enable tokio console for debugging
    #[arg(long)]
    debug_console: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the gallery and list its images, newest first
    Browse,
    /// Show a single image from the gallery
    Open {
        /// ID of the image
        id: String,
    },
    /// Capture an image and save it into the gallery album
    #[command(group(ArgGroup::new("source").required(true).args(["camera", "library"])))]
    Add {
        /// Take a photo with the camera
        #[arg(long)]
        camera: bool,
        /// Pick an existing image from the photo library
        #[arg(long)]
        library: bool,
        /// Image file standing in for the capture; omit to cancel
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Allow a capability (library_read, library_write, camera)
    Grant { capability: Capability },
    /// Deny a capability (library_read, library_write, camera)
    Revoke { capability: Capability },
    /// Display all albums
    Albums,
    /// Show gallery and permission status
    Status,
}

fn init_tracing(cfg: &AppConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    #[cfg(feature = "tokio-console")]
    {
        if cfg.debug_console {
            console_subscriber::init();
            return Ok(None);
        }
    }

    std::fs::create_dir_all(&cfg.data_path)?;
    let file_appender = rolling::daily(&cfg.data_path, "image_gallery.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stdout.and(file_writer))
        .init();
    Ok(Some(guard))
}

fn print_snapshot(snap: &GallerySnapshot) {
    match &snap.screen {
        ScreenState::Unauthorized => {
            println!("Photo library access denied. Allow it with `gallery_cli grant library_read`.")
        }
        ScreenState::Loading => println!("Loading..."),
        ScreenState::Empty => println!("No images yet"),
        ScreenState::Ready(assets) => {
            println!("Images: {}", assets.len());
            for asset in assets {
                println!("{}  {}  {}", asset.id, asset.created_at.to_rfc3339(), asset.uri);
            }
        }
    }
    print_notice(snap);
}

fn print_notice(snap: &GallerySnapshot) {
    if let Some(notice) = &snap.pending_notice {
        match notice.kind {
            NoticeKind::Info => println!("{}", notice.message),
            NoticeKind::Error => println!("Error: {}", notice.message),
        }
    }
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = AppConfigOverrides {
        log_level: cli.log_level.clone(),
        page_size: cli.page_size,
        album_name: cli.album_name.clone(),
        data_path: cli.data_path.clone(),
        debug_console: cli.debug_console,
    };
    let cfg = AppConfig::load_from(cli.config.clone()).apply_overrides(&overrides);
    let _guard = init_tracing(&cfg)?;

    let db_path = cfg.db_path();
    let grants = Arc::new(FileGrantStore::in_dir(&cfg.data_path, cfg.default_permission));

    match cli.command {
        Commands::Browse => {
            let vm = open_gallery(&cfg, grants, None)?;
            vm.start().await;
            print_snapshot(&vm.snapshot());
        }
        Commands::Open { id } => {
            let vm = open_gallery(&cfg, grants, None)?;
            vm.start().await;
            vm.open_image(&id);
            let snap = vm.snapshot();
            match &snap.viewer.selected {
                Some(asset) => {
                    println!("Image: {}", asset.id);
                    println!("Created: {}", asset.created_at.to_rfc3339());
                    println!("Location: {}", asset.uri);
                }
                None => println!("Image not found: {}", id),
            }
            print_notice(&snap);
        }
        Commands::Add { camera, library: _, file } => {
            let source = if camera {
                CaptureSource::Camera
            } else {
                CaptureSource::Library
            };
            let vm = open_gallery(&cfg, grants, file)?;
            vm.start().await;
            let before = vm.snapshot();
            vm.add_photo_requested(source).await;
            let after = vm.snapshot();
            if after == before {
                println!("Nothing added");
            }
            print_snapshot(&after);
        }
        Commands::Grant { capability } => {
            grants.grant(capability)?;
            println!("Granted {}", capability);
        }
        Commands::Revoke { capability } => {
            grants.revoke(capability)?;
            println!("Revoked {}", capability);
        }
        Commands::Albums => {
            if !db_path.exists() {
                println!("No gallery found at {:?}", db_path);
                return Ok(());
            }
            let store = SqliteMediaStore::new(&db_path, &cfg.media_dir())?;
            let albums = store.list_albums()?;
            if albums.is_empty() {
                println!("No albums found");
            }
            for album in albums {
                let count = store.album_assets(&album.id)?.len();
                println!("{} (id: {}, images: {})", album.name, album.id, count);
            }
        }
        Commands::Status => {
            for capability in Capability::ALL {
                let state = grants.query(capability).await?;
                println!("{}: {:?}", capability, state);
            }
            if !db_path.exists() {
                println!("No gallery found at {:?}", db_path);
                return Ok(());
            }
            let store = SqliteMediaStore::new(&db_path, &cfg.media_dir())?;
            println!("Images: {}", store.asset_count()?);
            println!("Albums: {}", store.list_albums()?.len());
        }
    }

    Ok(())
}

fn open_gallery(
    cfg: &AppConfig,
    grants: Arc<FileGrantStore>,
    capture_file: Option<PathBuf>,
) -> Result<GalleryViewModel, Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteMediaStore::new(&cfg.db_path(), &cfg.media_dir())?);
    let ui = Arc::new(FileCaptureUi::new(capture_file));
    Ok(GalleryViewModel::new(grants, store, ui, cfg.gallery_config()))
}
