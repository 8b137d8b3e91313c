//! The persistent file version log (`.vlog`).
//!
//! Versioning-enabled files keep an append-only record of whole-file
//! snapshots. Each entry is a fixed 24-byte big-endian frame:
//! `file_size (u64) | object_count (u64) | timestamp (i64)`. Entries are
//! appended on copy-on-write commits; on load the whole log is read and a
//! truncated tail frame (from an interrupted append) is dropped. The
//! presence of the log is what marks a file as versioning-enabled.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{LayoutError, Result};

/// Version log file name.
pub const VLOG_FILENAME: &str = ".vlog";

/// Size of one on-disk log frame.
const RECORD_LEN: usize = 24;

/// One whole-file snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersion {
    /// File size at snapshot time.
    pub file_size: u64,

    /// Number of objects at snapshot time.
    pub object_count: u64,

    /// Snapshot timestamp (COW generation counter).
    pub timestamp: i64,
}

impl FileVersion {
    fn to_bytes(self) -> [u8; RECORD_LEN] {
        let mut frame = [0u8; RECORD_LEN];
        frame[..8].copy_from_slice(&self.file_size.to_be_bytes());
        frame[8..16].copy_from_slice(&self.object_count.to_be_bytes());
        frame[16..].copy_from_slice(&self.timestamp.to_be_bytes());
        frame
    }

    fn from_bytes(frame: &[u8]) -> Self {
        let mut word = [0u8; 8];
        word.copy_from_slice(&frame[..8]);
        let file_size = u64::from_be_bytes(word);
        word.copy_from_slice(&frame[8..16]);
        let object_count = u64::from_be_bytes(word);
        word.copy_from_slice(&frame[16..]);
        let timestamp = i64::from_be_bytes(word);
        Self {
            file_size,
            object_count,
            timestamp,
        }
    }
}

/// In-memory view of a file's `.vlog`.
#[derive(Debug, Default, Clone)]
pub struct FileVersionLog {
    entries: Vec<FileVersion>,
}

impl FileVersionLog {
    /// An empty log (a versioning-enabled file before its first snapshot).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the log at `path`, or `None` when the file does not exist.
    ///
    /// A tail shorter than one frame is dropped with a WARN; everything
    /// before it is kept.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LayoutError::io(path)(e)),
        };

        let mut raw = Vec::new();
        file.read_to_end(&mut raw).map_err(LayoutError::io(path))?;

        let complete = raw.len() - raw.len() % RECORD_LEN;
        if complete < raw.len() {
            log::warn!(
                "dropping truncated tail entry ({} bytes) of version log {}",
                raw.len() - complete,
                path.display()
            );
        }

        let entries = raw[..complete]
            .chunks_exact(RECORD_LEN)
            .map(FileVersion::from_bytes)
            .collect();
        Ok(Some(Self { entries }))
    }

    /// Append a snapshot to the on-disk log and to this view.
    pub fn append(&mut self, path: &Path, entry: FileVersion) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(LayoutError::create(path))?;
        file.write_all(&entry.to_bytes())
            .map_err(LayoutError::io(path))?;
        file.sync_all().map_err(LayoutError::io(path))?;

        self.entries.push(entry);
        Ok(())
    }

    /// The most recent snapshot with `timestamp <= ts`.
    ///
    /// Among equal timestamps the later append wins.
    pub fn latest_before(&self, ts: i64) -> Option<&FileVersion> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.timestamp <= ts)
            .max_by_key(|entry| entry.timestamp)
    }

    /// The most recent snapshot overall.
    pub fn latest(&self) -> Option<&FileVersion> {
        self.latest_before(i64::MAX)
    }

    /// All loaded snapshots, in append order.
    pub fn entries(&self) -> &[FileVersion] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
