//! Screenshot persistence under the two storage strategies.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use directories::UserDirs;
use image::RgbaImage;
use tracing::{debug, error, info, instrument, warn};

use screenshot_ipc::{CaptureConfig, SavedScreenshot, StorageKind};

use crate::error::StoreError;
use crate::index::{MediaEntry, MediaIndex};
use crate::png::{encode_png, screenshot_file_name, PNG_MIME_TYPE};
use crate::scanner::MediaScanner;
use crate::StoreResult;

/// Strategy used for a given capability tier.
pub fn strategy_for_tier(tier: u32, indexed_min_tier: u32) -> StorageKind {
    if tier >= indexed_min_tier {
        StorageKind::Indexed
    } else {
        StorageKind::DirectPath
    }
}

/// The user's public pictures directory.
///
/// Falls back to `~/Pictures` when the platform does not define one.
pub fn default_pictures_dir() -> StoreResult<PathBuf> {
    let user_dirs = UserDirs::new().ok_or(StoreError::NoPicturesDir)?;
    Ok(user_dirs
        .picture_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| user_dirs.home_dir().join("Pictures")))
}

/// Writes decoded screenshots to durable, gallery-visible storage.
pub struct ImagePersister {
    strategy: StorageKind,
    pictures_dir: PathBuf,
    album: String,
    index: Box<dyn MediaIndex>,
    scanner: Box<dyn MediaScanner>,
}

impl ImagePersister {
    /// Create a persister using an explicit strategy.
    pub fn new(
        strategy: StorageKind,
        pictures_dir: impl Into<PathBuf>,
        album: impl Into<String>,
        index: Box<dyn MediaIndex>,
        scanner: Box<dyn MediaScanner>,
    ) -> Self {
        Self {
            strategy,
            pictures_dir: pictures_dir.into(),
            album: album.into(),
            index,
            scanner,
        }
    }

    /// Create a persister whose strategy and location follow `config`.
    pub fn from_config(
        config: &CaptureConfig,
        index: Box<dyn MediaIndex>,
        scanner: Box<dyn MediaScanner>,
    ) -> StoreResult<Self> {
        let pictures_dir = match &config.pictures_dir {
            Some(dir) => dir.clone(),
            None => default_pictures_dir()?,
        };
        let strategy = strategy_for_tier(config.capability_tier, config.indexed_storage_min_tier);

        Ok(Self::new(
            strategy,
            pictures_dir,
            config.album.clone(),
            index,
            scanner,
        ))
    }

    /// Strategy this persister uses.
    pub fn strategy(&self) -> StorageKind {
        self.strategy
    }

    /// Directory direct-path writes go to.
    pub fn album_dir(&self) -> PathBuf {
        self.pictures_dir.join(&self.album)
    }

    /// Store `image` named after the current local time.
    pub fn save(&mut self, image: &RgbaImage) -> StoreResult<SavedScreenshot> {
        self.save_at(image, Local::now())
    }

    /// Store `image` named after `timestamp`.
    #[instrument(name = "persist_screenshot", skip(self, image), fields(strategy = ?self.strategy))]
    pub fn save_at(
        &mut self,
        image: &RgbaImage,
        timestamp: DateTime<Local>,
    ) -> StoreResult<SavedScreenshot> {
        let file_name = screenshot_file_name(&timestamp);
        let png = encode_png(image)?;

        let result = match self.strategy {
            StorageKind::Indexed => self.save_indexed(&png, &file_name),
            StorageKind::DirectPath => self.save_direct(&png, &file_name),
        };

        match result {
            Ok(location) => {
                info!("Image saved: {}", location.display());
                let file_name = location
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or(file_name);
                Ok(SavedScreenshot {
                    file_name,
                    location,
                    storage: self.strategy,
                })
            }
            Err(e) => {
                error!("Failed to save image: {}", e);
                Err(e)
            }
        }
    }

    fn save_indexed(&mut self, png: &[u8], file_name: &str) -> StoreResult<PathBuf> {
        let entry = MediaEntry {
            display_name: file_name.to_string(),
            mime_type: PNG_MIME_TYPE.to_string(),
            relative_path: self.album.clone(),
        };

        let mut handle = self
            .index
            .insert(&entry)?
            .ok_or_else(|| StoreError::RegistrationFailed(file_name.to_string()))?;

        if let Err(e) = handle.write_all(png).and_then(|()| handle.flush()) {
            handle.abort();
            return Err(e.into());
        }

        handle.commit()
    }

    fn save_direct(&mut self, png: &[u8], file_name: &str) -> StoreResult<PathBuf> {
        let dir = self.album_dir();
        if !dir.exists() {
            debug!(dir = %dir.display(), "Creating album directory");
            fs::create_dir_all(&dir)?;
        }

        let path = dir.join(file_name);
        if let Err(e) = write_file(&path, png) {
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!("Failed to remove partial {}: {}", path.display(), cleanup);
            }
            return Err(e.into());
        }

        self.scanner.scan_file(&path)?;
        Ok(path)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
