//! PNG encoding and durable storage of captured screenshots.
//!
//! Two strategies are supported. Indexed storage registers the entry
//! with a [`MediaIndex`] before writing through the handle it returns.
//! Direct-path storage writes under the album directory and then asks a
//! [`MediaScanner`] to make the file visible.

mod error;
mod index;
mod persister;
mod png;
mod scanner;

pub use error::StoreError;
pub use index::{FsMediaIndex, IndexRecord, MediaEntry, MediaHandle, MediaIndex, INDEX_FILE_NAME};
pub use persister::{default_pictures_dir, strategy_for_tier, ImagePersister};
pub use png::{encode_png, screenshot_file_name, PNG_MIME_TYPE, PNG_QUALITY};
pub use scanner::{ChannelMediaScanner, LogMediaScanner, MediaScanner, ScanRequest};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
