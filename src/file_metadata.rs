//! The per-open-file metadata record.

use std::sync::Arc;

use crate::striping::StripingPolicy;
use crate::version_manager::VersionManager;

/// Everything the storage engine keeps in memory for one open file.
///
/// Reconstructed from the file's directory on open (`load_file_metadata`)
/// and kept current by the write paths. The version manager inside is a
/// cache over the directory contents; the sizes and epochs are derived
/// values.
#[derive(Debug)]
pub struct FileMetadata {
    /// How the file is cut into stripes; injected by the caller.
    striping_policy: Arc<dyn StripingPolicy>,

    /// Index of on-disk object versions (owns the version log, if any).
    version_manager: VersionManager,

    /// Current file size in bytes.
    file_size: u64,

    /// Largest object number stored locally; -1 when the file has no
    /// objects.
    last_object_number: i64,

    /// Cluster-wide last object number hint; -1 when unknown.
    global_last_object_number: i64,

    /// Truncate generation counter, used to reject stale writes upstream.
    truncate_epoch: i64,
}

impl FileMetadata {
    pub fn new(striping_policy: Arc<dyn StripingPolicy>) -> Self {
        Self {
            striping_policy,
            version_manager: VersionManager::new(),
            file_size: 0,
            last_object_number: -1,
            global_last_object_number: -1,
            truncate_epoch: 0,
        }
    }

    pub fn striping_policy(&self) -> &Arc<dyn StripingPolicy> {
        &self.striping_policy
    }

    /// Stripe size of the given object, in bytes.
    pub fn stripe_size(&self, object_number: u64) -> usize {
        self.striping_policy.stripe_size_for_object(object_number)
    }

    pub fn version_manager(&self) -> &VersionManager {
        &self.version_manager
    }

    pub fn version_manager_mut(&mut self) -> &mut VersionManager {
        &mut self.version_manager
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn set_file_size(&mut self, file_size: u64) {
        self.file_size = file_size;
    }

    pub fn last_object_number(&self) -> i64 {
        self.last_object_number
    }

    pub fn set_last_object_number(&mut self, last_object_number: i64) {
        self.last_object_number = last_object_number;
    }

    pub fn global_last_object_number(&self) -> i64 {
        self.global_last_object_number
    }

    pub fn set_global_last_object_number(&mut self, global_last_object_number: i64) {
        self.global_last_object_number = global_last_object_number;
    }

    pub fn truncate_epoch(&self) -> i64 {
        self.truncate_epoch
    }

    pub fn set_truncate_epoch(&mut self, truncate_epoch: i64) {
        self.truncate_epoch = truncate_epoch;
    }

    /// Object count implied by the local last object number; used as the
    /// cap for COW-aware version lookups.
    pub fn object_count_hint(&self) -> u64 {
        (self.last_object_number + 1).max(0) as u64
    }
}
