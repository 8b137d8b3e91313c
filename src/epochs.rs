//! Small per-file metadata files.
//!
//! Three fixed-name dotfiles live next to a file's object files:
//!
//! - `.tepoch`: truncate epoch, 8-byte big-endian i64
//! - `.mepoch`: master epoch, 4-byte big-endian i32; absent means 0
//! - `.tlog`: length-delimited serialized [`TruncateLog`]; absent means
//!   an empty log
//!
//! All rewrites go through a temporary sibling plus rename, so a crash can
//! never leave a half-written value behind. The leading dot keeps these
//! files out of object enumeration.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// Truncate epoch file name.
pub const TEPOCH_FILENAME: &str = ".tepoch";

/// Master epoch file name.
pub const MEPOCH_FILENAME: &str = ".mepoch";

/// Truncate log file name.
pub const TLOG_FILENAME: &str = ".tlog";

/// One truncate operation acknowledged by this OSD.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateRecord {
    /// File version the truncate established.
    pub version: u64,

    /// Last object number after the truncate.
    pub last_object_number: u64,
}

/// The per-file truncate log persisted in `.tlog`.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TruncateLog {
    pub records: Vec<TruncateRecord>,
}

/// Atomically replace `path` with `bytes` (tmp sibling + fsync + rename).
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut temp_file = File::create(&temp_path).map_err(LayoutError::create(&temp_path))?;
    temp_file
        .write_all(bytes)
        .map_err(LayoutError::io(&temp_path))?;
    temp_file.sync_all().map_err(LayoutError::io(&temp_path))?;

    fs::rename(&temp_path, path).map_err(LayoutError::io(path))?;
    Ok(())
}

/// Read the truncate epoch, or `None` when the file does not exist.
pub fn read_truncate_epoch(file_dir: &Path) -> Result<Option<i64>> {
    let path = file_dir.join(TEPOCH_FILENAME);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LayoutError::io(&path)(e)),
    };
    let frame: [u8; 8] = raw
        .as_slice()
        .try_into()
        .map_err(|_| LayoutError::CorruptMetadata {
            path: path.clone(),
            message: format!("expected 8 bytes, found {}", raw.len()),
        })?;
    Ok(Some(i64::from_be_bytes(frame)))
}

/// Rewrite the truncate epoch.
pub fn write_truncate_epoch(file_dir: &Path, epoch: i64) -> Result<()> {
    write_atomic(&file_dir.join(TEPOCH_FILENAME), &epoch.to_be_bytes())
}

/// Read the master epoch; an absent file means 0.
pub fn read_master_epoch(file_dir: &Path) -> Result<i32> {
    let path = file_dir.join(MEPOCH_FILENAME);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(LayoutError::io(&path)(e)),
    };
    let frame: [u8; 4] = raw
        .as_slice()
        .try_into()
        .map_err(|_| LayoutError::CorruptMetadata {
            path: path.clone(),
            message: format!("expected 4 bytes, found {}", raw.len()),
        })?;
    Ok(i32::from_be_bytes(frame))
}

/// Rewrite the master epoch.
pub fn write_master_epoch(file_dir: &Path, epoch: i32) -> Result<()> {
    write_atomic(&file_dir.join(MEPOCH_FILENAME), &epoch.to_be_bytes())
}

/// Read the truncate log; an absent file means an empty log.
pub fn read_truncate_log(file_dir: &Path) -> Result<TruncateLog> {
    let path = file_dir.join(TLOG_FILENAME);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TruncateLog::default()),
        Err(e) => return Err(LayoutError::io(&path)(e)),
    };

    if raw.len() < 4 {
        return Err(LayoutError::CorruptMetadata {
            path,
            message: format!("missing length frame, found {} bytes", raw.len()),
        });
    }
    let mut frame = [0u8; 4];
    frame.copy_from_slice(&raw[..4]);
    let declared = u32::from_be_bytes(frame) as usize;
    if raw.len() - 4 < declared {
        return Err(LayoutError::CorruptMetadata {
            path,
            message: format!(
                "length frame declares {declared} bytes, {} present",
                raw.len() - 4
            ),
        });
    }

    // rkyv access requires aligned bytes; the payload sits at offset 4.
    let mut aligned = rkyv::util::AlignedVec::<16>::new();
    aligned.extend_from_slice(&raw[4..4 + declared]);
    rkyv::from_bytes::<TruncateLog, rkyv::rancor::BoxedError>(&aligned).map_err(|e| {
        LayoutError::CorruptMetadata {
            path,
            message: e.to_string(),
        }
    })
}

/// Rewrite the truncate log.
pub fn write_truncate_log(file_dir: &Path, truncate_log: &TruncateLog) -> Result<()> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::BoxedError>(truncate_log)
        .map_err(|e| LayoutError::TruncateLogSerialization(Box::new(e)))?;

    let mut framed = Vec::with_capacity(4 + bytes.len());
    framed.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    framed.extend_from_slice(&bytes);
    write_atomic(&file_dir.join(TLOG_FILENAME), &framed)
}
