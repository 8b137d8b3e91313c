//! Configuration for a storage layout instance.

use std::path::{Path, PathBuf};

/// Default bound on the number of subdirectories per fan-out level.
///
/// 255 is the largest index expressible in two hex digits, so the default
/// fan-out uses two-character path chunks (256 subdirectories per level).
pub const DEFAULT_MAX_SUBDIRS_PER_DIR: u32 = 255;

/// Default depth of the hash fan-out below the storage root.
pub const DEFAULT_MAX_DIR_DEPTH: u32 = 4;

/// Configuration of a [`StorageLayout`] instance.
///
/// The fan-out parameters determine the shape of the hashed directory tree
/// and must stay constant for the lifetime of a storage root: changing them
/// makes existing file directories unresolvable.
///
/// [`StorageLayout`]: crate::layout::StorageLayout
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Root directory of the object store.
    storage_root: PathBuf,

    /// Upper bound on subdirectories per fan-out level.
    max_subdirs_per_dir: u32,

    /// Number of hash-chunk directory levels below the storage root.
    max_dir_depth: u32,

    /// Whether object payloads are checksummed.
    checksums_enabled: bool,

    /// Name of the checksum algorithm to resolve from the factory.
    checksum_algorithm: String,
}

impl LayoutConfig {
    /// Create a configuration with default fan-out and checksums disabled.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            max_subdirs_per_dir: DEFAULT_MAX_SUBDIRS_PER_DIR,
            max_dir_depth: DEFAULT_MAX_DIR_DEPTH,
            checksums_enabled: false,
            checksum_algorithm: "blake3".to_string(),
        }
    }

    /// Override the fan-out bound (subdirectories per level).
    pub fn with_max_subdirs_per_dir(mut self, max_subdirs_per_dir: u32) -> Self {
        self.max_subdirs_per_dir = max_subdirs_per_dir;
        self
    }

    /// Override the fan-out depth.
    pub fn with_max_dir_depth(mut self, max_dir_depth: u32) -> Self {
        self.max_dir_depth = max_dir_depth;
        self
    }

    /// Enable checksumming with the given algorithm name.
    pub fn with_checksums(mut self, algorithm: impl Into<String>) -> Self {
        self.checksums_enabled = true;
        self.checksum_algorithm = algorithm.into();
        self
    }

    /// Root directory of the object store.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Upper bound on subdirectories per fan-out level.
    pub fn max_subdirs_per_dir(&self) -> u32 {
        self.max_subdirs_per_dir
    }

    /// Number of hash-chunk directory levels.
    pub fn max_dir_depth(&self) -> u32 {
        self.max_dir_depth
    }

    /// Whether object payloads are checksummed.
    pub fn checksums_enabled(&self) -> bool {
        self.checksums_enabled
    }

    /// Configured checksum algorithm name.
    pub fn checksum_algorithm(&self) -> &str {
        &self.checksum_algorithm
    }
}
