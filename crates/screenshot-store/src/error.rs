//! Error types for the store module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while storing a screenshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Encode(String),

    /// The media index did not hand out a write handle.
    #[error("Media index returned no handle for {0}")]
    RegistrationFailed(String),

    /// The media index itself is unusable.
    #[error("Media index error: {0}")]
    Index(String),

    /// The media scanner could not be notified.
    #[error("Media scan failed for {}: {message}", path.display())]
    Scan { path: PathBuf, message: String },

    /// No public pictures location could be determined.
    #[error("No pictures directory available")]
    NoPicturesDir,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
