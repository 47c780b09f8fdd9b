//! Media index registration.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::StoreResult;

/// Name of the index file kept at the root of an [`FsMediaIndex`].
pub const INDEX_FILE_NAME: &str = ".media-index.jsonl";

/// Metadata registered with the media index before any bytes are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    /// File name shown in galleries.
    pub display_name: String,

    /// MIME type of the content.
    pub mime_type: String,

    /// Album path relative to the public pictures location.
    pub relative_path: String,
}

/// System media index.
pub trait MediaIndex: Send {
    /// Register `entry` and return a handle to write its content through.
    ///
    /// `Ok(None)` means the index declined the registration.
    fn insert(&mut self, entry: &MediaEntry) -> StoreResult<Option<Box<dyn MediaHandle>>>;
}

/// Write handle for a registered media entry.
///
/// Content stays invisible until [`MediaHandle::commit`]; an aborted or
/// dropped handle leaves nothing behind.
pub trait MediaHandle: Write + Send {
    /// Publish the written content and return its final location.
    fn commit(self: Box<Self>) -> StoreResult<PathBuf>;

    /// Discard the entry and everything written so far.
    fn abort(self: Box<Self>);
}

/// A published entry as recorded in the index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Registered metadata.
    #[serde(flatten)]
    pub entry: MediaEntry,

    /// Final location of the file.
    pub path: PathBuf,

    /// Size in bytes.
    pub size: u64,
}

/// Media index kept as a JSON-lines file beside the pictures it tracks.
#[derive(Debug, Clone)]
pub struct FsMediaIndex {
    root: PathBuf,
}

impl FsMediaIndex {
    /// Create an index rooted at the public pictures location.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the index.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read every published record.
    pub fn records(&self) -> StoreResult<Vec<IndexRecord>> {
        let path = self.root.join(INDEX_FILE_NAME);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| StoreError::Index(format!("corrupt record in {}: {}", path.display(), e)))
            })
            .collect()
    }

    /// Pick a name in `dir` not taken by `display_name`, adding ` (n)` if needed.
    fn unique_name(dir: &Path, display_name: &str) -> String {
        if !dir.join(display_name).exists() {
            return display_name.to_string();
        }

        let (stem, ext) = match display_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (display_name, String::new()),
        };

        (1..)
            .map(|n| format!("{stem} ({n}){ext}"))
            .find(|candidate| !dir.join(candidate).exists())
            .unwrap_or_else(|| display_name.to_string())
    }
}

impl MediaIndex for FsMediaIndex {
    fn insert(&mut self, entry: &MediaEntry) -> StoreResult<Option<Box<dyn MediaHandle>>> {
        let dir = self.root.join(&entry.relative_path);
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Media index cannot create {}: {}", dir.display(), e);
            return Ok(None);
        }

        let name = Self::unique_name(&dir, &entry.display_name);
        let final_path = dir.join(&name);
        let pending_path = dir.join(format!(".pending-{name}"));

        let file = match File::create(&pending_path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Media index cannot create {}: {}", pending_path.display(), e);
                return Ok(None);
            }
        };

        debug!(pending = %pending_path.display(), "Registered media entry");
        Ok(Some(Box::new(FsMediaHandle {
            writer: Some(BufWriter::new(file)),
            pending_path,
            final_path,
            index_path: self.root.join(INDEX_FILE_NAME),
            entry: MediaEntry {
                display_name: name,
                ..entry.clone()
            },
            committed: false,
        })))
    }
}

struct FsMediaHandle {
    writer: Option<BufWriter<File>>,
    pending_path: PathBuf,
    final_path: PathBuf,
    index_path: PathBuf,
    entry: MediaEntry,
    committed: bool,
}

impl FsMediaHandle {
    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "media handle closed"))
    }

    fn publish(&mut self) -> StoreResult<()> {
        let writer = self.writer.take().ok_or_else(|| {
            StoreError::Index(format!("{} already closed", self.entry.display_name))
        })?;
        let file = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        file.sync_all()?;
        let size = file.metadata()?.len();
        drop(file);

        let record = IndexRecord {
            entry: self.entry.clone(),
            path: self.final_path.clone(),
            size,
        };
        let line = serde_json::to_string(&record).map_err(|e| StoreError::Index(e.to_string()))?;

        // Open the index first so a failure here publishes nothing.
        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.index_path)?;

        fs::rename(&self.pending_path, &self.final_path)?;

        if let Err(e) = writeln!(index, "{line}") {
            // Unindexed files must not stay visible.
            let _ = fs::remove_file(&self.final_path);
            return Err(e.into());
        }

        self.committed = true;
        Ok(())
    }

    fn discard(&mut self) {
        self.writer = None;
        match fs::remove_file(&self.pending_path) {
            Ok(()) => debug!(pending = %self.pending_path.display(), "Discarded media entry"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.pending_path.display(), e),
        }
    }
}

impl Write for FsMediaHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl MediaHandle for FsMediaHandle {
    fn commit(mut self: Box<Self>) -> StoreResult<PathBuf> {
        self.publish()?;
        info!(path = %self.final_path.display(), "Media entry published");
        Ok(self.final_path.clone())
    }

    fn abort(mut self: Box<Self>) {
        self.discard();
    }
}

impl Drop for FsMediaHandle {
    fn drop(&mut self) {
        if !self.committed {
            self.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "screenshot-index-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        root
    }

    fn entry(name: &str) -> MediaEntry {
        MediaEntry {
            display_name: name.to_string(),
            mime_type: "image/png".to_string(),
            relative_path: "Screenshots".to_string(),
        }
    }

    #[test]
    fn test_commit_publishes_and_records() {
        let root = temp_root("commit");
        let mut index = FsMediaIndex::new(&root);

        let mut handle = index.insert(&entry("a.png")).unwrap().unwrap();
        handle.write_all(b"png bytes").unwrap();
        let path = handle.commit().unwrap();

        assert_eq!(path, root.join("Screenshots").join("a.png"));
        assert_eq!(fs::read(&path).unwrap(), b"png bytes");
        assert!(!root.join("Screenshots").join(".pending-a.png").exists());

        let records = index.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entry, entry("a.png"));
        assert_eq!(records[0].size, 9);
    }

    #[test]
    fn test_abort_leaves_nothing() {
        let root = temp_root("abort");
        let mut index = FsMediaIndex::new(&root);

        let mut handle = index.insert(&entry("b.png")).unwrap().unwrap();
        handle.write_all(b"partial").unwrap();
        handle.abort();

        let album = root.join("Screenshots");
        assert_eq!(fs::read_dir(&album).unwrap().count(), 0);
        assert!(index.records().unwrap().is_empty());
    }

    #[test]
    fn test_dropped_handle_leaves_nothing() {
        let root = temp_root("drop");
        let mut index = FsMediaIndex::new(&root);

        let handle = index.insert(&entry("c.png")).unwrap().unwrap();
        drop(handle);

        assert_eq!(fs::read_dir(root.join("Screenshots")).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_index_publishes_nothing() {
        let root = temp_root("unwritable");
        fs::create_dir_all(root.join(INDEX_FILE_NAME)).unwrap();
        let mut index = FsMediaIndex::new(&root);

        let mut handle = index.insert(&entry("f.png")).unwrap().unwrap();
        handle.write_all(b"png bytes").unwrap();
        assert!(handle.commit().is_err());

        let album = root.join("Screenshots");
        assert!(!album.join("f.png").exists());
        assert_eq!(fs::read_dir(&album).unwrap().count(), 0);
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let root = temp_root("collide");
        let mut index = FsMediaIndex::new(&root);

        for _ in 0..2 {
            let mut handle = index.insert(&entry("d.png")).unwrap().unwrap();
            handle.write_all(b"x").unwrap();
            handle.commit().unwrap();
        }

        let names: Vec<_> = index
            .records()
            .unwrap()
            .into_iter()
            .map(|r| r.entry.display_name)
            .collect();
        assert_eq!(names, vec!["d.png", "d (1).png"]);
    }

    #[test]
    fn test_unusable_root_declines_registration() {
        let root = temp_root("blocked");
        fs::create_dir_all(root.parent().unwrap()).unwrap();
        fs::write(&root, b"not a directory").unwrap();

        let mut index = FsMediaIndex::new(&root);
        assert!(index.insert(&entry("e.png")).unwrap().is_none());
        fs::remove_file(&root).unwrap();
    }
}
