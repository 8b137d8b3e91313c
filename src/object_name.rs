//! The object filename codec.
//!
//! An object file's name carries four pieces of metadata: object number,
//! object version, checksum, and the copy-on-write timestamp. Three
//! historical formats exist on disk and must all decode:
//!
//! | length | layout (hex, big-endian)                                   |
//! |--------|------------------------------------------------------------|
//! | 32     | objNo(16) version(8) checksum(8), timestamp = -1           |
//! | 48     | objNo(16) version(16) checksum(16), timestamp = -1         |
//! | 64     | objNo(16) version(16) checksum(16) cowTimestamp(16)        |
//!
//! Encoding always emits the 48-character form, appending the timestamp
//! field when it is not -1. Every field is zero-padded lowercase hex.

use crate::error::{LayoutError, Result};

/// Identity of an on-disk object file: (objNo, version, timestamp, checksum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectVersionInfo {
    /// Which stripe of the file this object holds.
    pub object_number: u64,

    /// Object version; 0 is reserved for "does not exist".
    pub version: u64,

    /// COW generation counter; -1 denotes "legacy, no COW".
    pub timestamp: i64,

    /// 64-bit payload checksum; 0 when checksums are disabled or for
    /// padding objects.
    pub checksum: u64,
}

impl ObjectVersionInfo {
    pub fn new(object_number: u64, version: u64, timestamp: i64, checksum: u64) -> Self {
        Self {
            object_number,
            version,
            timestamp,
            checksum,
        }
    }

    /// The synthetic entry denoting an object that does not exist (e.g.
    /// truncated away in the requested snapshot).
    pub fn does_not_exist(object_number: u64) -> Self {
        Self {
            object_number,
            version: 0,
            timestamp: -1,
            checksum: 0,
        }
    }

    /// Whether this entry names a real on-disk object.
    pub fn exists(&self) -> bool {
        self.version > 0
    }

    /// Encode this identity as an object filename.
    pub fn file_name(&self) -> String {
        encode(
            self.object_number,
            self.version,
            self.checksum,
            self.timestamp,
        )
    }
}

/// Encode an object filename from its four fields.
///
/// Always emits the 48-character form; the 16-character timestamp field is
/// appended when `timestamp != -1`.
pub fn encode(object_number: u64, version: u64, checksum: u64, timestamp: i64) -> String {
    if timestamp == -1 {
        format!("{object_number:016x}{version:016x}{checksum:016x}")
    } else {
        format!(
            "{object_number:016x}{version:016x}{checksum:016x}{:016x}",
            timestamp as u64
        )
    }
}

/// Decode an object filename in any of the three on-disk formats.
///
/// # Errors
///
/// Returns [`LayoutError::InvalidObjectName`] for names whose length is not
/// 32, 48 or 64, or which contain anything but lowercase hex.
pub fn parse(name: &str) -> Result<ObjectVersionInfo> {
    if !name
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(LayoutError::InvalidObjectName {
            name: name.to_string(),
        });
    }

    let (object_number, version, checksum, timestamp) = match name.len() {
        32 => (
            hex_field(name, 0, 16)?,
            hex_field(name, 16, 8)?,
            hex_field(name, 24, 8)?,
            -1,
        ),
        48 => (
            hex_field(name, 0, 16)?,
            hex_field(name, 16, 16)?,
            hex_field(name, 32, 16)?,
            -1,
        ),
        64 => (
            hex_field(name, 0, 16)?,
            hex_field(name, 16, 16)?,
            hex_field(name, 32, 16)?,
            hex_field(name, 48, 16)? as i64,
        ),
        _ => {
            return Err(LayoutError::InvalidObjectName {
                name: name.to_string(),
            });
        }
    };

    Ok(ObjectVersionInfo {
        object_number,
        version,
        timestamp,
        checksum,
    })
}

fn hex_field(name: &str, start: usize, width: usize) -> Result<u64> {
    u64::from_str_radix(&name[start..start + width], 16).map_err(|_| {
        LayoutError::InvalidObjectName {
            name: name.to_string(),
        }
    })
}
