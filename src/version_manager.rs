//! The per-open-file version index.
//!
//! Maps object numbers to the set of versions known to exist on disk and
//! answers the lookups the storage engine needs: exact, largest,
//! largest-before a version bound, and the COW-aware latest-before a
//! timestamp bound. The index is rebuilt from the file's directory on open
//! (see `load_file_metadata`); it is a cache over the filesystem, never the
//! source of truth, and mutations always follow the corresponding
//! filesystem mutation.

use std::collections::HashMap;

use crate::object_name::ObjectVersionInfo;
use crate::version_log::FileVersionLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VersionEntry {
    version: u64,
    timestamp: i64,
    checksum: u64,
}

/// In-memory index of (objectNumber, version, timestamp) → checksum.
#[derive(Debug, Default)]
pub struct VersionManager {
    /// Known versions per object, sorted by version ascending.
    versions: HashMap<u64, Vec<VersionEntry>>,

    /// The file's version log, when versioning is enabled.
    version_log: Option<FileVersionLog>,
}

impl VersionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the loaded `.vlog`; its presence marks the file as
    /// versioning-enabled.
    pub fn set_version_log(&mut self, log: FileVersionLog) {
        self.version_log = Some(log);
    }

    pub fn version_log(&self) -> Option<&FileVersionLog> {
        self.version_log.as_ref()
    }

    pub fn version_log_mut(&mut self) -> Option<&mut FileVersionLog> {
        self.version_log.as_mut()
    }

    /// The version log, attaching an empty one first when the file was not
    /// yet versioning-enabled.
    pub fn ensure_version_log(&mut self) -> &mut FileVersionLog {
        self.version_log.get_or_insert_with(FileVersionLog::empty)
    }

    pub fn is_versioning_enabled(&self) -> bool {
        self.version_log.is_some()
    }

    /// Record a version known to exist on disk.
    ///
    /// An entry with the same (version, timestamp) replaces the previous
    /// checksum.
    pub fn add_version(
        &mut self,
        object_number: u64,
        version: u64,
        timestamp: i64,
        checksum: u64,
    ) {
        let entries = self.versions.entry(object_number).or_default();
        let entry = VersionEntry {
            version,
            timestamp,
            checksum,
        };
        match entries.binary_search_by(|e| (e.version, e.timestamp).cmp(&(version, timestamp))) {
            Ok(at) => entries[at] = entry,
            Err(at) => entries.insert(at, entry),
        }
    }

    /// Drop a version after its file was deleted or renamed away.
    pub fn remove_version(&mut self, object_number: u64, version: u64, timestamp: i64) {
        if let Some(entries) = self.versions.get_mut(&object_number) {
            entries.retain(|e| !(e.version == version && e.timestamp == timestamp));
            if entries.is_empty() {
                self.versions.remove(&object_number);
            }
        }
    }

    /// Exact lookup of a known version.
    pub fn get_version(
        &self,
        object_number: u64,
        version: u64,
        timestamp: i64,
    ) -> Option<ObjectVersionInfo> {
        self.versions.get(&object_number).and_then(|entries| {
            entries
                .iter()
                .find(|e| e.version == version && e.timestamp == timestamp)
                .map(|e| self.info(object_number, e))
        })
    }

    /// The largest known version of an object.
    pub fn largest_version(&self, object_number: u64) -> Option<ObjectVersionInfo> {
        self.versions
            .get(&object_number)
            .and_then(|entries| entries.last())
            .map(|e| self.info(object_number, e))
    }

    /// The largest known version not newer than `version_upper`.
    pub fn largest_version_before(
        &self,
        object_number: u64,
        version_upper: u64,
    ) -> Option<ObjectVersionInfo> {
        self.versions.get(&object_number).and_then(|entries| {
            entries
                .iter()
                .rev()
                .find(|e| e.version <= version_upper)
                .map(|e| self.info(object_number, e))
        })
    }

    /// COW-aware lookup of the latest version at or before a timestamp.
    ///
    /// The object count in effect at `ts_upper` comes from the version log
    /// when one is present (the latest snapshot at or before the bound),
    /// falling back to `object_count_cap`. An object number at or beyond
    /// that count was truncated away: the synthetic does-not-exist entry is
    /// returned. Otherwise the known version with the largest timestamp at
    /// or before the bound wins, ties broken by the larger version.
    pub fn latest_version_before(
        &self,
        object_number: u64,
        ts_upper: i64,
        object_count_cap: u64,
    ) -> Option<ObjectVersionInfo> {
        let effective_count = self
            .version_log
            .as_ref()
            .and_then(|log| log.latest_before(ts_upper))
            .map(|snapshot| snapshot.object_count)
            .unwrap_or(object_count_cap);

        if object_number >= effective_count {
            return Some(ObjectVersionInfo::does_not_exist(object_number));
        }

        self.versions.get(&object_number).and_then(|entries| {
            entries
                .iter()
                .filter(|e| e.timestamp <= ts_upper)
                .max_by_key(|e| (e.timestamp, e.version))
                .map(|e| self.info(object_number, e))
        })
    }

    /// The largest object number with at least one known version.
    pub fn last_object_id(&self) -> Option<u64> {
        self.versions.keys().max().copied()
    }

    /// Number of objects implied by the largest known object number.
    pub fn object_count(&self) -> u64 {
        self.last_object_id().map(|last| last + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn info(&self, object_number: u64, entry: &VersionEntry) -> ObjectVersionInfo {
        ObjectVersionInfo {
            object_number,
            version: entry.version,
            timestamp: entry.timestamp,
            checksum: entry.checksum,
        }
    }
}
