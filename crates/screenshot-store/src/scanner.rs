//! Media scanner notifications for files written by path.

use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::StoreResult;

/// Makes a newly written file visible to the system gallery.
pub trait MediaScanner: Send {
    /// Announce the file at `path`.
    fn scan_file(&mut self, path: &Path) -> StoreResult<()>;
}

/// A request to index one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// File to index.
    pub path: PathBuf,
}

/// Scanner that forwards requests to whoever holds the receiver.
#[derive(Debug, Clone)]
pub struct ChannelMediaScanner {
    tx: Sender<ScanRequest>,
}

impl ChannelMediaScanner {
    /// Create a scanner and the receiver its requests arrive on.
    pub fn new() -> (Self, Receiver<ScanRequest>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl MediaScanner for ChannelMediaScanner {
    fn scan_file(&mut self, path: &Path) -> StoreResult<()> {
        self.tx
            .send(ScanRequest {
                path: path.to_path_buf(),
            })
            .map_err(|_| StoreError::Scan {
                path: path.to_path_buf(),
                message: "scanner disconnected".into(),
            })
    }
}

/// Scanner for hosts whose galleries watch the filesystem themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMediaScanner;

impl MediaScanner for LogMediaScanner {
    fn scan_file(&mut self, path: &Path) -> StoreResult<()> {
        info!(path = %path.display(), "New media file");
        Ok(())
    }
}
