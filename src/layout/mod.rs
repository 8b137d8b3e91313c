//! The object storage engine.
//!
//! Composes the path hasher, filename codec, checksum engine, version
//! index and the small metadata files into the read / write / truncate /
//! delete / enumerate operations the OSD stages call. One instance manages
//! one storage root.
//!
//! # Concurrency contract
//!
//! The engine is invoked by an upstream executor that serializes every
//! operation targeting the same file-id; operations on distinct file-ids
//! may run in parallel. Nothing here locks per file. The two small shared
//! pieces (path cache, checksum engine) are internally guarded so the
//! instance can be shared across that executor's threads.
//!
//! # Crash safety
//!
//! Every write lands either in a brand-new file name not yet referenced or
//! renames a file into its new name, and the in-memory version index is
//! only updated after the filesystem mutation is visible. A torn write can
//! therefore never corrupt a previously published version; recovery is
//! simply [`StorageLayout::load_file_metadata`] picking up whatever names
//! are present.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use walkdir::WalkDir;

use crate::checksum::{ChecksumEngine, ChecksumFactory};
use crate::config::LayoutConfig;
use crate::cow::CowPolicy;
use crate::epochs::{self, TruncateLog};
use crate::error::{LayoutError, Result};
use crate::file_metadata::FileMetadata;
use crate::object_name::{self, ObjectVersionInfo};
use crate::path_hasher::{PathHasher, unescape_file_id};
use crate::striping::StripingPolicy;
use crate::version_log::{FileVersion, FileVersionLog, VLOG_FILENAME};


/// Current on-disk layout version tag.
pub const LAYOUT_VERSION: i32 = 2;

/// Name of the version tag file in the storage root.
const VERSION_FILENAME: &str = ".version";

/// Whether a storage root written with layout version `tag` can be used.
///
/// Version 1 is the legacy int-version layout, still readable; everything
/// else is unknown.
pub fn is_compatible_version(tag: i32) -> bool {
    tag == LAYOUT_VERSION || tag == 1
}

/// Result state of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    /// The object file exists and has content.
    Exists,

    /// No file for the requested version is on disk.
    DoesNotExist,

    /// A zero-length file representing a hole of full stripe length.
    PaddingObject,
}

/// What a read returned.
#[derive(Debug)]
pub struct ObjectInformation {
    pub status: ObjectStatus,

    /// Payload bytes; `None` for non-existing and padding objects. May be
    /// empty when the read started at or past the end of the object.
    pub data: Option<Vec<u8>>,

    /// Stripe size of the object, for the caller's padding arithmetic.
    pub stripe_size: usize,

    /// Set when a whole-object read with checksums enabled did not match
    /// the checksum recorded in the object's filename.
    pub checksum_invalid: bool,
}

impl ObjectInformation {
    fn does_not_exist(stripe_size: usize) -> Self {
        Self {
            status: ObjectStatus::DoesNotExist,
            data: None,
            stripe_size,
            checksum_invalid: false,
        }
    }

    fn padding(stripe_size: usize) -> Self {
        Self {
            status: ObjectStatus::PaddingObject,
            data: None,
            stripe_size,
            checksum_invalid: false,
        }
    }

    fn exists(data: Vec<u8>, stripe_size: usize, checksum_invalid: bool) -> Self {
        Self {
            status: ObjectStatus::Exists,
            data: Some(data),
            stripe_size,
            checksum_invalid,
        }
    }
}

/// One file emitted by the paged enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListEntry {
    pub file_id: String,

    /// Estimated file size (see [`StorageLayout::get_file_list`]).
    pub size: u64,

    /// Estimated object size in KiB.
    pub object_size_kb: u32,
}

/// One page of the resumable enumeration.
#[derive(Debug)]
pub struct FileListPage {
    pub files: Vec<FileListEntry>,

    /// Whether another call with the same stack will yield more files.
    pub has_more: bool,
}

/// The object storage engine for one storage root.
#[derive(Debug)]
pub struct StorageLayout {
    storage_root: PathBuf,
    hasher: PathHasher,
    checksums: ChecksumEngine,
}

impl StorageLayout {
    /// Open (and on first use initialize) a storage root.
    ///
    /// Creates the root directory if needed and checks its layout version
    /// tag; a fresh root is tagged with the current version. The checksum
    /// algorithm named in the configuration is resolved from `factory`; an
    /// unknown name logs an ERROR and disables checksums (it does not fail
    /// the open).
    ///
    /// # Errors
    ///
    /// Fails when the root cannot be created or read, or when the version
    /// tag is incompatible ([`LayoutError::IncompatibleLayout`]).
    pub fn open(config: &LayoutConfig, factory: &ChecksumFactory) -> Result<Self> {
        let storage_root = config.storage_root().to_path_buf();
        fs::create_dir_all(&storage_root).map_err(LayoutError::create(&storage_root))?;

        let version_path = storage_root.join(VERSION_FILENAME);
        match fs::read(&version_path) {
            Ok(raw) => {
                let frame: [u8; 4] =
                    raw.as_slice()
                        .try_into()
                        .map_err(|_| LayoutError::CorruptMetadata {
                            path: version_path.clone(),
                            message: format!("expected 4 bytes, found {}", raw.len()),
                        })?;
                let tag = i32::from_be_bytes(frame);
                if !is_compatible_version(tag) {
                    return Err(LayoutError::IncompatibleLayout { found: tag });
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                epochs::write_atomic(&version_path, &LAYOUT_VERSION.to_be_bytes())?;
            }
            Err(e) => return Err(LayoutError::io(&version_path)(e)),
        }

        Ok(Self {
            storage_root,
            hasher: PathHasher::new(config.max_subdirs_per_dir(), config.max_dir_depth()),
            checksums: ChecksumEngine::new(
                config.checksums_enabled(),
                config.checksum_algorithm(),
                factory,
            ),
        })
    }

    /// The storage root this instance manages.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Whether payload checksums are active.
    pub fn checksums_enabled(&self) -> bool {
        self.checksums.enabled()
    }

    /// Absolute path of a file's directory.
    pub fn file_directory(&self, file_id: &str) -> PathBuf {
        self.storage_root.join(self.hasher.relative_path(file_id))
    }

    /// Relative directory path of a file below the storage root.
    pub fn relative_file_directory(&self, file_id: &str) -> String {
        self.hasher.relative_path(file_id)
    }

    /// Absolute path of one object version's file.
    pub fn object_path(&self, file_id: &str, version: &ObjectVersionInfo) -> PathBuf {
        self.file_directory(file_id).join(version.file_name())
    }

    /// Whether a directory for the file exists.
    pub fn file_exists(&self, file_id: &str) -> bool {
        self.file_directory(file_id).is_dir()
    }

    // ------------------------------------------------------------------
    // read
    // ------------------------------------------------------------------

    /// Read from the object version named by `version`.
    ///
    /// `length = None` means "the entire stripe" and requires `offset` 0.
    /// A `version` with `version.version == 0` (the synthetic does-not-
    /// exist entry) short-circuits to [`ObjectStatus::DoesNotExist`], as
    /// does a missing file. A zero-length file is a padding object. An
    /// `offset` at or past the end of the file yields `Exists` with an
    /// empty buffer; otherwise `min(length, file length - offset)` bytes
    /// are returned.
    ///
    /// With checksums enabled, a read that covers the whole payload is
    /// verified against the checksum in the filename; a mismatch sets
    /// `checksum_invalid` on the result instead of failing the read.
    pub fn read_object(
        &self,
        file_id: &str,
        md: &FileMetadata,
        version: &ObjectVersionInfo,
        offset: usize,
        length: Option<usize>,
    ) -> Result<ObjectInformation> {
        let object_number = version.object_number;
        let stripe_size = md.stripe_size(object_number);
        if length.is_none() {
            assert!(offset == 0, "full-stripe reads start at offset 0");
        }
        let read_length = length.unwrap_or(stripe_size);
        assert!(
            offset + read_length <= stripe_size,
            "read beyond stripe end"
        );

        if !version.exists() {
            return Ok(ObjectInformation::does_not_exist(stripe_size));
        }

        let path = self.object_path(file_id, version);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ObjectInformation::does_not_exist(stripe_size));
            }
            Err(e) => return Err(LayoutError::io(&path)(e)),
        };

        let file_length = file.metadata().map_err(LayoutError::io(&path))?.len();
        if file_length == 0 {
            return Ok(ObjectInformation::padding(stripe_size));
        }
        if offset as u64 >= file_length {
            return Ok(ObjectInformation::exists(Vec::new(), stripe_size, false));
        }

        let wanted = read_length.min((file_length - offset as u64) as usize);

        // A whole-payload read with checksums on is served from a memory
        // mapping, so verification and the returned buffer come from the
        // same bytes. Partial reads cannot verify a whole-payload checksum
        // and never flag.
        if self.checksums.enabled() && offset == 0 && wanted as u64 == file_length {
            let mmap = unsafe { Mmap::map(&file) }.map_err(LayoutError::io(&path))?;
            let checksum_invalid = self.checksums.checksum(&mmap) != version.checksum;
            return Ok(ObjectInformation::exists(
                mmap.to_vec(),
                stripe_size,
                checksum_invalid,
            ));
        }

        let mut data = vec![0u8; wanted];
        file.seek(SeekFrom::Start(offset as u64))
            .map_err(LayoutError::io(&path))?;
        file.read_exact(&mut data).map_err(LayoutError::io(&path))?;

        Ok(ObjectInformation::exists(data, stripe_size, false))
    }

    // ------------------------------------------------------------------
    // write
    // ------------------------------------------------------------------

    /// Write `data` into the stripe of `object_number` at `offset`,
    /// creating the version `(new_version, new_timestamp)`.
    ///
    /// Zero-length data is a no-op. A write covering the whole stripe
    /// takes the single-shot path; anything smaller is a range write,
    /// which copies when the COW policy or checksums demand it and patches
    /// in place otherwise. `sync` forces the object to stable storage
    /// before returning.
    ///
    /// A write extending the file raises the metadata's last object
    /// number; the file size stays with the caller, which knows the write
    /// offsets of all replicas.
    ///
    /// # Panics
    ///
    /// `new_version` must be positive and the write must end within the
    /// stripe; violations are programmer errors.
    #[allow(clippy::too_many_arguments)]
    pub fn write_object(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        data: &[u8],
        object_number: u64,
        offset: usize,
        new_version: u64,
        new_timestamp: i64,
        sync: bool,
        cow: &mut CowPolicy,
    ) -> Result<()> {
        assert!(new_version > 0, "object versions start at 1");
        if data.is_empty() {
            return Ok(());
        }

        let stripe_size = md.stripe_size(object_number);
        assert!(
            offset + data.len() <= stripe_size,
            "write beyond stripe end"
        );

        let is_range_write = offset > 0 || data.len() < stripe_size;
        if is_range_write {
            if cow.is_cow(object_number) || self.checksums.enabled() {
                self.partial_write_cow(
                    file_id,
                    md,
                    data,
                    object_number,
                    offset,
                    new_version,
                    new_timestamp,
                    sync,
                    cow,
                )?;
            } else {
                self.partial_write_no_cow(
                    file_id,
                    md,
                    data,
                    object_number,
                    offset,
                    new_version,
                    new_timestamp,
                    sync,
                    cow,
                )?;
            }
        } else {
            self.complete_write(
                file_id,
                md,
                data,
                object_number,
                new_version,
                new_timestamp,
                sync,
                cow,
            )?;
        }

        if object_number as i64 > md.last_object_number() {
            md.set_last_object_number(object_number as i64);
        }
        if cow.cow_enabled() {
            cow.object_changed(object_number);
        }
        Ok(())
    }

    /// Single-shot write of a full stripe as a fresh file.
    #[allow(clippy::too_many_arguments)]
    fn complete_write(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        data: &[u8],
        object_number: u64,
        new_version: u64,
        new_timestamp: i64,
        sync: bool,
        cow: &CowPolicy,
    ) -> Result<()> {
        let checksum = self.checksums.checksum(data);
        let predecessor = md.version_manager().largest_version(object_number);

        let new_info = ObjectVersionInfo::new(object_number, new_version, new_timestamp, checksum);
        let new_path = self.create_object_file(file_id, &new_info, data, sync)?;

        if !cow.is_cow(object_number)
            && let Some(prev) = predecessor
            && (prev.version != new_version
                || prev.timestamp != new_timestamp
                || prev.checksum != checksum)
        {
            let prev_path = self.object_path(file_id, &prev);
            if prev_path != new_path && self.remove_superseded(&prev_path) {
                md.version_manager_mut().remove_version(
                    object_number,
                    prev.version,
                    prev.timestamp,
                );
            }
        }

        md.version_manager_mut()
            .add_version(object_number, new_version, new_timestamp, checksum);
        Ok(())
    }

    /// Range write that materializes the full stripe into a fresh file,
    /// preserving the predecessor when the COW policy says so.
    #[allow(clippy::too_many_arguments)]
    fn partial_write_cow(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        data: &[u8],
        object_number: u64,
        offset: usize,
        new_version: u64,
        new_timestamp: i64,
        sync: bool,
        cow: &CowPolicy,
    ) -> Result<()> {
        let stripe_size = md.stripe_size(object_number);
        // The latest version overall; may be the synthetic zero entry when
        // a snapshot truncated the object away.
        let predecessor = md.version_manager().latest_version_before(
            object_number,
            i64::MAX,
            md.object_count_hint(),
        );

        let mut merged = match &predecessor {
            Some(prev) if prev.exists() => {
                self.read_full_object(file_id, prev, stripe_size)?
            }
            _ => Vec::new(),
        };
        let merged_len = merged.len().max(offset + data.len());
        merged.resize(merged_len, 0);
        merged[offset..offset + data.len()].copy_from_slice(data);

        let checksum = self.checksums.checksum(&merged);
        let new_info = ObjectVersionInfo::new(object_number, new_version, new_timestamp, checksum);
        let new_path = self.create_object_file(file_id, &new_info, &merged, sync)?;

        if !cow.is_cow(object_number)
            && let Some(prev) = predecessor
            && prev.exists()
        {
            let prev_path = self.object_path(file_id, &prev);
            if prev_path != new_path && self.remove_superseded(&prev_path) {
                md.version_manager_mut().remove_version(
                    object_number,
                    prev.version,
                    prev.timestamp,
                );
            }
        }

        md.version_manager_mut()
            .add_version(object_number, new_version, new_timestamp, checksum);
        Ok(())
    }

    /// In-place range write; only valid with checksums off.
    ///
    /// When the new `(version, timestamp)` differs from the predecessor's,
    /// the file is renamed to the new encoded name (checksum field 0) and
    /// the version index updated; an identity-unchanged write leaves both
    /// untouched.
    #[allow(clippy::too_many_arguments)]
    fn partial_write_no_cow(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        data: &[u8],
        object_number: u64,
        offset: usize,
        new_version: u64,
        new_timestamp: i64,
        sync: bool,
        cow: &CowPolicy,
    ) -> Result<()> {
        assert!(
            !self.checksums.enabled(),
            "in-place writes would leave a stale checksum"
        );

        // With COW globally enabled the predecessor must respect snapshot
        // truncation; otherwise the largest known version is the target.
        let predecessor = if cow.cow_enabled() {
            md.version_manager().latest_version_before(
                object_number,
                i64::MAX,
                md.object_count_hint(),
            )
        } else {
            md.version_manager().largest_version(object_number)
        };

        match predecessor {
            Some(prev) if prev.exists() => {
                let prev_path = self.object_path(file_id, &prev);
                self.patch_object_file(&prev_path, data, offset, sync)?;

                if prev.version != new_version || prev.timestamp != new_timestamp {
                    let new_info =
                        ObjectVersionInfo::new(object_number, new_version, new_timestamp, 0);
                    let new_path = self.object_path(file_id, &new_info);
                    fs::rename(&prev_path, &new_path).map_err(LayoutError::io(&new_path))?;

                    let vm = md.version_manager_mut();
                    vm.remove_version(object_number, prev.version, prev.timestamp);
                    vm.add_version(object_number, new_version, new_timestamp, 0);
                }
            }
            _ => {
                // No predecessor on disk: a fresh sparse file at the new
                // name, zero-filled up to the offset.
                let new_info = ObjectVersionInfo::new(object_number, new_version, new_timestamp, 0);
                let dir = self.file_directory(file_id);
                fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;
                let new_path = dir.join(new_info.file_name());
                self.patch_object_file(&new_path, data, offset, sync)?;

                md.version_manager_mut()
                    .add_version(object_number, new_version, new_timestamp, 0);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // truncate / padding / delete
    // ------------------------------------------------------------------

    /// Set the length of one object to `new_length`.
    ///
    /// A no-op when the current length already matches. With `cow` or
    /// checksums enabled the current payload is materialized, resized
    /// (zero-padded growth) and written as a fresh file; otherwise the
    /// file is truncated in place and renamed only if the version identity
    /// changed.
    ///
    /// # Panics
    ///
    /// `new_length` must not exceed the stripe size.
    #[allow(clippy::too_many_arguments)]
    pub fn truncate_object(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        object_number: u64,
        new_length: usize,
        new_version: u64,
        new_timestamp: i64,
        cow: bool,
    ) -> Result<()> {
        let stripe_size = md.stripe_size(object_number);
        assert!(new_length <= stripe_size, "truncate beyond stripe end");

        let current = md.version_manager().largest_version(object_number);
        let current_length = match &current {
            Some(cur) => {
                let path = self.object_path(file_id, cur);
                match fs::metadata(&path) {
                    Ok(meta) => meta.len(),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                    Err(e) => return Err(LayoutError::io(&path)(e)),
                }
            }
            None => 0,
        };
        if current.is_some() && new_length as u64 == current_length {
            return Ok(());
        }

        if cow || self.checksums.enabled() {
            let mut payload = match &current {
                Some(cur) => self.read_raw_object(file_id, cur)?,
                None => Vec::new(),
            };
            payload.resize(new_length, 0);
            let checksum = self.checksums.checksum(&payload);

            if !cow && let Some(cur) = &current {
                let cur_path = self.object_path(file_id, cur);
                if self.remove_superseded(&cur_path) {
                    md.version_manager_mut().remove_version(
                        object_number,
                        cur.version,
                        cur.timestamp,
                    );
                }
            }

            let new_info =
                ObjectVersionInfo::new(object_number, new_version, new_timestamp, checksum);
            self.create_object_file(file_id, &new_info, &payload, false)?;
            md.version_manager_mut()
                .add_version(object_number, new_version, new_timestamp, checksum);
        } else {
            match current {
                Some(cur) => {
                    let cur_path = self.object_path(file_id, &cur);
                    let file = OpenOptions::new()
                        .write(true)
                        .open(&cur_path)
                        .map_err(LayoutError::io(&cur_path))?;
                    file.set_len(new_length as u64)
                        .map_err(LayoutError::io(&cur_path))?;

                    if cur.version != new_version || cur.timestamp != new_timestamp {
                        let new_info =
                            ObjectVersionInfo::new(object_number, new_version, new_timestamp, 0);
                        let new_path = self.object_path(file_id, &new_info);
                        fs::rename(&cur_path, &new_path).map_err(LayoutError::io(&new_path))?;

                        let vm = md.version_manager_mut();
                        vm.remove_version(object_number, cur.version, cur.timestamp);
                        vm.add_version(object_number, new_version, new_timestamp, 0);
                    }
                }
                None => {
                    // Nothing on disk yet: a grow-from-nothing produces a
                    // fresh zero file of the requested length.
                    let new_info =
                        ObjectVersionInfo::new(object_number, new_version, new_timestamp, 0);
                    let dir = self.file_directory(file_id);
                    fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;
                    let new_path = dir.join(new_info.file_name());
                    let file = File::create(&new_path).map_err(LayoutError::create(&new_path))?;
                    file.set_len(new_length as u64)
                        .map_err(LayoutError::io(&new_path))?;

                    md.version_manager_mut()
                        .add_version(object_number, new_version, new_timestamp, 0);
                }
            }
        }
        if object_number as i64 > md.last_object_number() {
            md.set_last_object_number(object_number as i64);
        }
        Ok(())
    }

    /// Create a padding object: an empty file extended to `size` bytes
    /// without writing data.
    pub fn create_padding_object(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        object_number: u64,
        version: u64,
        timestamp: i64,
        size: usize,
    ) -> Result<()> {
        let checksum = self.checksums.checksum_of_zeroes(size);
        let info = ObjectVersionInfo::new(object_number, version, timestamp, checksum);

        let dir = self.file_directory(file_id);
        fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;
        let path = dir.join(info.file_name());
        let file = File::create(&path).map_err(LayoutError::create(&path))?;
        file.set_len(size as u64).map_err(LayoutError::io(&path))?;

        md.version_manager_mut()
            .add_version(object_number, version, timestamp, checksum);
        if object_number as i64 > md.last_object_number() {
            md.set_last_object_number(object_number as i64);
        }
        Ok(())
    }

    /// Delete one object version.
    ///
    /// `version == 0` selects the largest known version; otherwise
    /// `timestamp == 0` selects the largest version at or before
    /// `version`; otherwise the exact `(version, timestamp)` entry.
    ///
    /// # Errors
    ///
    /// [`LayoutError::VersionNotFound`] when the selector matches nothing.
    pub fn delete_object(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        object_number: u64,
        version: u64,
        timestamp: i64,
    ) -> Result<()> {
        let vm = md.version_manager();
        let target = if version == 0 {
            vm.largest_version(object_number)
        } else if timestamp == 0 {
            vm.largest_version_before(object_number, version)
        } else {
            vm.get_version(object_number, version, timestamp)
        };

        let target = target.ok_or_else(|| LayoutError::VersionNotFound {
            file_id: file_id.to_string(),
            object_number,
        })?;

        let path = self.object_path(file_id, &target);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LayoutError::io(&path)(e)),
        }
        md.version_manager_mut()
            .remove_version(object_number, target.version, target.timestamp);
        Ok(())
    }

    /// Delete a file's objects, and with `delete_metadata` also its
    /// metadata files, its directory and any empty fan-out ancestors
    /// (stopping at the storage root).
    pub fn delete_file(&self, file_id: &str, delete_metadata: bool) -> Result<()> {
        let dir = self.file_directory(file_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(LayoutError::io(&dir)(e)),
        };

        for entry in entries {
            let entry = entry.map_err(LayoutError::io(&dir))?;
            let name = entry.file_name();
            let is_metadata = name.to_string_lossy().starts_with('.');
            if !is_metadata || delete_metadata {
                fs::remove_file(entry.path()).map_err(LayoutError::io(entry.path()))?;
            }
        }

        if delete_metadata {
            fs::remove_dir(&dir).map_err(LayoutError::io(&dir))?;
            let mut ancestor = dir.parent();
            while let Some(parent) = ancestor {
                if parent == self.storage_root || fs::remove_dir(parent).is_err() {
                    break;
                }
                ancestor = parent.parent();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // per-file metadata
    // ------------------------------------------------------------------

    /// Reconstruct a file's metadata from its directory.
    ///
    /// Loads the version log (when present), indexes every object file
    /// (unparseable names are logged and ignored, dotfiles never indexed),
    /// reads the truncate epoch, and derives file size and last object
    /// number: from the latest file-version entry for versioning-enabled
    /// files, else from the largest object on disk, where a zero-length
    /// last object counts as a full stripe.
    pub fn load_file_metadata(
        &self,
        file_id: &str,
        striping_policy: Arc<dyn StripingPolicy>,
    ) -> Result<FileMetadata> {
        let mut md = FileMetadata::new(striping_policy);
        let dir = self.file_directory(file_id);

        if let Some(log) = FileVersionLog::load(&dir.join(VLOG_FILENAME))? {
            md.version_manager_mut().set_version_log(log);
        }

        match fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry.map_err(LayoutError::io(&dir))?;
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    if name.starts_with('.') {
                        continue;
                    }
                    match object_name::parse(&name) {
                        Ok(info) => md.version_manager_mut().add_version(
                            info.object_number,
                            info.version,
                            info.timestamp,
                            info.checksum,
                        ),
                        Err(_) => {
                            log::warn!(
                                "illegal file discovered and ignored: {}",
                                entry.path().display()
                            );
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LayoutError::io(&dir)(e)),
        }

        if let Some(epoch) = epochs::read_truncate_epoch(&dir)? {
            md.set_truncate_epoch(epoch);
        }

        if md.version_manager().is_versioning_enabled() {
            let latest = md
                .version_manager()
                .version_log()
                .and_then(|log| log.latest())
                .copied();
            if let Some(snapshot) = latest {
                md.set_file_size(snapshot.file_size);
                md.set_last_object_number(snapshot.object_count as i64 - 1);
            }
        } else if let Some(last_object) = md.version_manager().last_object_id()
            && let Some(largest) = md.version_manager().largest_version(last_object)
        {
            let path = self.object_path(file_id, &largest);
            let on_disk = fs::metadata(&path).map_err(LayoutError::io(&path))?.len();

            // A zero-length last object is a padding object and accounts
            // as a full stripe.
            let last_object_size = if on_disk == 0 {
                md.stripe_size(last_object) as u64
            } else {
                on_disk
            };
            let preceding = if last_object > 0 {
                md.striping_policy().object_end_offset(last_object - 1) + 1
            } else {
                0
            };
            md.set_file_size(last_object_size + preceding);
            md.set_last_object_number(last_object as i64);
        }

        md.set_global_last_object_number(-1);
        Ok(md)
    }

    /// Persist a new truncate epoch, creating the file directory if this
    /// is the first write to the file.
    pub fn set_truncate_epoch(&self, file_id: &str, epoch: i64) -> Result<()> {
        let dir = self.file_directory(file_id);
        fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;
        epochs::write_truncate_epoch(&dir, epoch)
    }

    /// The persisted truncate epoch, if any.
    pub fn get_truncate_epoch(&self, file_id: &str) -> Result<Option<i64>> {
        epochs::read_truncate_epoch(&self.file_directory(file_id))
    }

    /// The persisted master epoch; 0 when none was ever written.
    pub fn get_master_epoch(&self, file_id: &str) -> Result<i32> {
        epochs::read_master_epoch(&self.file_directory(file_id))
    }

    /// Persist the master epoch.
    pub fn set_master_epoch(&self, file_id: &str, epoch: i32) -> Result<()> {
        let dir = self.file_directory(file_id);
        fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;
        epochs::write_master_epoch(&dir, epoch)
    }

    /// The persisted truncate log; empty when none was ever written.
    pub fn get_truncate_log(&self, file_id: &str) -> Result<TruncateLog> {
        epochs::read_truncate_log(&self.file_directory(file_id))
    }

    /// Persist the truncate log.
    pub fn set_truncate_log(&self, file_id: &str, truncate_log: &TruncateLog) -> Result<()> {
        let dir = self.file_directory(file_id);
        fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;
        epochs::write_truncate_log(&dir, truncate_log)
    }

    /// Record a whole-file snapshot in the version log (COW commit).
    ///
    /// Attaches an empty log first when the file was not yet
    /// versioning-enabled.
    pub fn append_file_version(
        &self,
        file_id: &str,
        md: &mut FileMetadata,
        timestamp: i64,
    ) -> Result<()> {
        let dir = self.file_directory(file_id);
        fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;

        let snapshot = FileVersion {
            file_size: md.file_size(),
            object_count: md.version_manager().object_count(),
            timestamp,
        };

        md.version_manager_mut()
            .ensure_version_log()
            .append(&dir.join(VLOG_FILENAME), snapshot)
    }

    // ------------------------------------------------------------------
    // enumeration
    // ------------------------------------------------------------------

    /// Depth-first sweep of the storage root.
    ///
    /// Directories whose name contains `:` are not traversed; files whose
    /// name contains `.` or ends in `.ser` are skipped; every other file's
    /// basename is emitted.
    ///
    /// Note that the emitted names are object-file basenames, not
    /// file-ids; this mirrors the historical contract. Use
    /// [`get_file_list`](Self::get_file_list) to enumerate file-ids.
    pub fn get_file_id_list(&self) -> Vec<String> {
        WalkDir::new(&self.storage_root)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry.file_name().to_string_lossy().contains(':')
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.contains('.') || name.ends_with(".ser") {
                    None
                } else {
                    Some(name)
                }
            })
            .collect()
    }

    /// One page of a resumable walk over all stored files.
    ///
    /// The caller holds the walk state in `stack`; pass an empty stack to
    /// start from the storage root, then keep passing the same stack while
    /// [`FileListPage::has_more`] is set. Per file directory the object
    /// with the largest version is picked (head = smallest, tail = largest
    /// object number at that version) and the file size estimated as the
    /// head length for single-object files, else
    /// `head_len × (stripe_count − 1) + tail_len`. The estimate never
    /// opens metadata files, so it is approximate for sparse files.
    pub fn get_file_list(
        &self,
        stack: &mut Vec<PathBuf>,
        max_entries: usize,
    ) -> Result<FileListPage> {
        if stack.is_empty() {
            stack.push(self.storage_root.clone());
        }

        let mut files = Vec::new();
        while files.len() < max_entries {
            let Some(dir) = stack.pop() else {
                break;
            };

            let mut objects: Vec<(ObjectVersionInfo, u64)> = Vec::new();
            let mut subdirs = Vec::new();
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(LayoutError::io(&dir)(e)),
            };
            for entry in entries {
                let entry = entry.map_err(LayoutError::io(&dir))?;
                let file_type = entry.file_type().map_err(LayoutError::io(entry.path()))?;
                if file_type.is_dir() {
                    subdirs.push(entry.path());
                    continue;
                }
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') {
                    continue;
                }
                if let Ok(info) = object_name::parse(&name) {
                    let len = entry.metadata().map_err(LayoutError::io(entry.path()))?.len();
                    objects.push((info, len));
                }
            }

            if objects.is_empty() {
                stack.extend(subdirs);
                continue;
            }

            // A directory holding object files is a file directory; its
            // basename is the (escaped) file-id.
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file_id = unescape_file_id(&name).into_owned();

            let Some(largest) = objects.iter().map(|(info, _)| info.version).max() else {
                continue;
            };
            let at_largest: Vec<&(ObjectVersionInfo, u64)> = objects
                .iter()
                .filter(|(info, _)| info.version == largest)
                .collect();
            let (Some(head), Some(tail)) = (
                at_largest.iter().min_by_key(|(info, _)| info.object_number),
                at_largest.iter().max_by_key(|(info, _)| info.object_number),
            ) else {
                continue;
            };

            let stripe_count = at_largest.len() as u64;
            let size = if stripe_count == 1 {
                head.1
            } else {
                head.1 * (stripe_count - 1) + tail.1
            };

            files.push(FileListEntry {
                file_id,
                size,
                object_size_kb: (head.1 / 1024) as u32,
            });
        }

        Ok(FileListPage {
            has_more: !stack.is_empty(),
            files,
        })
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// Write a brand-new object file, creating the file directory on
    /// demand. Returns the path written.
    fn create_object_file(
        &self,
        file_id: &str,
        info: &ObjectVersionInfo,
        data: &[u8],
        sync: bool,
    ) -> Result<PathBuf> {
        let dir = self.file_directory(file_id);
        fs::create_dir_all(&dir).map_err(LayoutError::create(&dir))?;

        let path = dir.join(info.file_name());
        let mut file = File::create(&path).map_err(LayoutError::create(&path))?;
        file.write_all(data).map_err(LayoutError::io(&path))?;
        if sync {
            file.sync_all().map_err(LayoutError::io(&path))?;
        }
        Ok(path)
    }

    /// Seek-and-write into an existing (or fresh) object file.
    fn patch_object_file(
        &self,
        path: &Path,
        data: &[u8],
        offset: usize,
        sync: bool,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)
            .map_err(LayoutError::io(path))?;
        file.seek(SeekFrom::Start(offset as u64))
            .map_err(LayoutError::io(path))?;
        file.write_all(data).map_err(LayoutError::io(path))?;
        if sync {
            file.sync_all().map_err(LayoutError::io(path))?;
        }
        Ok(())
    }

    /// The object's payload with padding materialized: a zero-length file
    /// stands for a hole of full stripe length.
    fn read_full_object(
        &self,
        file_id: &str,
        info: &ObjectVersionInfo,
        stripe_size: usize,
    ) -> Result<Vec<u8>> {
        let raw = self.read_raw_object(file_id, info)?;
        if raw.is_empty() {
            let path = self.object_path(file_id, info);
            if path.exists() {
                return Ok(vec![0u8; stripe_size]);
            }
        }
        Ok(raw)
    }

    /// The object file's bytes exactly as stored; missing file reads as
    /// empty.
    fn read_raw_object(&self, file_id: &str, info: &ObjectVersionInfo) -> Result<Vec<u8>> {
        let path = self.object_path(file_id, info);
        match fs::read(&path) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LayoutError::io(&path)(e)),
        }
    }

    /// Best-effort delete of a superseded object file. Failure is logged,
    /// not retried; the version index keeps the entry so it still mirrors
    /// the directory.
    fn remove_superseded(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                log::warn!("unable to delete superseded object {}: {e}", path.display());
                false
            }
        }
    }
}
