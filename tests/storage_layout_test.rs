//! End-to-end scenarios against a real storage root.

use std::fs;
use std::sync::Arc;

use assert_fs::TempDir;
use osd_layout::checksum::ChecksumFactory;
use osd_layout::config::LayoutConfig;
use osd_layout::cow::{CowMode, CowPolicy};
use osd_layout::file_metadata::FileMetadata;
use osd_layout::layout::{ObjectStatus, StorageLayout};
use osd_layout::object_name::{self, ObjectVersionInfo};
use osd_layout::striping::Raid0;

const STRIPE: usize = 128 * 1024;

fn open_layout(root: &std::path::Path, checksums: bool) -> StorageLayout {
    let mut config = LayoutConfig::new(root);
    if checksums {
        config = config.with_checksums("blake3");
    }
    StorageLayout::open(&config, &ChecksumFactory::default()).unwrap()
}

fn fresh_md() -> FileMetadata {
    FileMetadata::new(Arc::new(Raid0::new(STRIPE)))
}

fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8) ^ seed).collect()
}

fn object_files(layout: &StorageLayout, file_id: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(layout.file_directory(file_id))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// S1: a fresh full-stripe write creates the hashed directory and a single
/// object file named with (0, 1, 0, 0).
#[test]
fn fresh_write_creates_directory_and_object() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let mut md = fresh_md();
    let mut cow = CowPolicy::no_cow();

    let buf = payload(STRIPE, 1);
    layout
        .write_object("F1", &mut md, &buf, 0, 0, 1, 0, false, &mut cow)
        .unwrap();

    let dir = layout.file_directory("F1");
    assert!(dir.is_dir());
    assert!(dir.starts_with(temp_dir.path()));
    assert!(dir.ends_with("F1"));

    assert_eq!(object_files(&layout, "F1"), vec![object_name::encode(0, 1, 0, 0)]);

    let largest = md.version_manager().largest_version(0).unwrap();
    assert_eq!(largest.version, 1);
    assert_eq!(largest.timestamp, 0);
    assert_eq!(largest.checksum, 0);
}

/// S2: a partial overwrite without COW patches in place and renames to the
/// new version; a single file remains.
#[test]
fn partial_overwrite_without_cow() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let mut md = fresh_md();
    let mut cow = CowPolicy::no_cow();

    let base = payload(STRIPE, 1);
    layout
        .write_object("F1", &mut md, &base, 0, 0, 1, 0, false, &mut cow)
        .unwrap();

    let patch = payload(1024, 9);
    layout
        .write_object("F1", &mut md, &patch, 0, 4096, 2, 0, false, &mut cow)
        .unwrap();

    assert_eq!(object_files(&layout, "F1"), vec![object_name::encode(0, 2, 0, 0)]);

    let largest = md.version_manager().largest_version(0).unwrap();
    let read = layout
        .read_object("F1", &md, &largest, 0, None)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(&read[..4096], &base[..4096]);
    assert_eq!(&read[4096..5120], &patch[..]);
    assert_eq!(&read[5120..], &base[5120..]);
}

/// S3: the same overwrite with checksums enabled produces a brand-new file
/// named with the merged stripe's checksum and deletes the predecessor.
#[test]
fn partial_overwrite_with_checksums() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), true);
    let mut md = fresh_md();
    let mut cow = CowPolicy::no_cow();

    let base = payload(STRIPE, 1);
    layout
        .write_object("F1", &mut md, &base, 0, 0, 1, 0, false, &mut cow)
        .unwrap();
    let old = md.version_manager().largest_version(0).unwrap();

    let patch = payload(1024, 9);
    layout
        .write_object("F1", &mut md, &patch, 0, 4096, 2, 0, false, &mut cow)
        .unwrap();

    let mut merged = base.clone();
    merged[4096..5120].copy_from_slice(&patch);

    let new = md.version_manager().largest_version(0).unwrap();
    assert_eq!(new.version, 2);
    assert_ne!(new.checksum, old.checksum);
    assert_eq!(
        object_files(&layout, "F1"),
        vec![object_name::encode(0, 2, new.checksum, 0)]
    );
    assert!(md.version_manager().get_version(0, 1, 0).is_none());

    let read = layout.read_object("F1", &md, &new, 0, None).unwrap();
    assert_eq!(read.data.unwrap(), merged);
    assert!(!read.checksum_invalid);
}

/// S4: a shrinking truncate without COW sets the length in place and
/// renames to the new version with checksum 0.
#[test]
fn truncate_shrink_without_cow() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let mut md = fresh_md();
    let mut cow = CowPolicy::no_cow();

    layout
        .write_object("F1", &mut md, &payload(10_000, 1), 0, 0, 1, 0, false, &mut cow)
        .unwrap();

    layout
        .truncate_object("F1", &mut md, 0, 4000, 3, 0, false)
        .unwrap();

    assert_eq!(object_files(&layout, "F1"), vec![object_name::encode(0, 3, 0, 0)]);
    let largest = md.version_manager().largest_version(0).unwrap();
    let path = layout.object_path("F1", &largest);
    assert_eq!(fs::metadata(path).unwrap().len(), 4000);
}

/// S5: reading a version-0 entry of a file that was never written reports
/// DOES_NOT_EXIST with the object's stripe size.
#[test]
fn read_of_non_existent_object() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let md = fresh_md();

    let info = layout
        .read_object("G", &md, &ObjectVersionInfo::does_not_exist(5), 0, None)
        .unwrap();
    assert_eq!(info.status, ObjectStatus::DoesNotExist);
    assert!(info.data.is_none());
    assert_eq!(info.stripe_size, STRIPE);
}

/// S6: metadata reconstruction after a crash indexes every object file,
/// reads the truncate epoch, and ignores dotfiles.
#[test]
fn load_file_metadata_after_crash() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);

    let dir = layout.file_directory("F1");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(object_name::encode(0, 1, 0xc1, 0)), payload(STRIPE, 1)).unwrap();
    fs::write(dir.join(object_name::encode(0, 2, 0xc2, 0)), payload(STRIPE, 2)).unwrap();
    fs::write(dir.join(object_name::encode(1, 1, 0xc3, 0)), payload(777, 3)).unwrap();
    fs::write(dir.join(".tepoch"), 7i64.to_be_bytes()).unwrap();

    let md = layout
        .load_file_metadata("F1", Arc::new(Raid0::new(STRIPE)))
        .unwrap();

    assert_eq!(md.version_manager().last_object_id(), Some(1));
    assert_eq!(md.version_manager().largest_version(0).unwrap().version, 2);
    assert_eq!(md.truncate_epoch(), 7);
    assert_eq!(md.file_size(), STRIPE as u64 + 777);
    // The dotfile was never indexed as an object.
    assert!(md.version_manager().get_version(0, 7, 0).is_none());
}

/// Snapshot reads travel back through the version log: after a COW commit
/// at ts=10 and an overwrite at ts=20, the ts=10 state is still readable.
#[test]
fn snapshot_read_through_version_log() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let mut md = fresh_md();

    let old = payload(STRIPE, 1);
    layout
        .write_object("V", &mut md, &old, 0, 0, 1, 10, false, &mut CowPolicy::no_cow())
        .unwrap();
    md.set_file_size(STRIPE as u64);
    layout.append_file_version("V", &mut md, 10).unwrap();

    // New open-file lifetime with COW: the overwrite copies.
    let mut cow = CowPolicy::new(CowMode::Once);
    layout
        .write_object("V", &mut md, &payload(2048, 9), 0, 0, 2, 20, false, &mut cow)
        .unwrap();

    // The old version is still on disk and reachable below its timestamp.
    let at_10 = md
        .version_manager()
        .latest_version_before(0, 10, md.object_count_hint())
        .unwrap();
    assert_eq!((at_10.version, at_10.timestamp), (1, 10));
    let read = layout.read_object("V", &md, &at_10, 0, None).unwrap();
    assert_eq!(read.data.unwrap(), old);

    // The head of the file sees the overwrite.
    let head = md
        .version_manager()
        .latest_version_before(0, i64::MAX, md.object_count_hint())
        .unwrap();
    assert_eq!((head.version, head.timestamp), (2, 20));

    // A reload picks the snapshot up from disk.
    let reloaded = layout
        .load_file_metadata("V", Arc::new(Raid0::new(STRIPE)))
        .unwrap();
    assert!(reloaded.version_manager().is_versioning_enabled());
    assert_eq!(reloaded.file_size(), STRIPE as u64);
}

/// The non-COW in-place write with unchanged (version, timestamp) leaves
/// both the name and the version index untouched.
#[test]
fn unchanged_identity_write_performs_no_rename() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let mut md = fresh_md();
    let mut cow = CowPolicy::no_cow();

    layout
        .write_object("F1", &mut md, &payload(STRIPE, 1), 0, 0, 4, 2, false, &mut cow)
        .unwrap();
    let before = object_files(&layout, "F1");

    layout
        .write_object("F1", &mut md, &payload(64, 9), 0, 128, 4, 2, false, &mut cow)
        .unwrap();
    assert_eq!(object_files(&layout, "F1"), before);
}

/// File-ids containing `:` map through the directory tree and delete
/// cleanly, including their fan-out ancestors.
#[test]
fn lifecycle_of_colon_file_id() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let mut md = fresh_md();
    let mut cow = CowPolicy::no_cow();

    let file_id = "f5c60831-2e9a-4e83:2581";
    layout
        .write_object(file_id, &mut md, &payload(STRIPE, 4), 0, 0, 1, 0, false, &mut cow)
        .unwrap();
    layout.set_truncate_epoch(file_id, 3).unwrap();
    assert!(layout.file_exists(file_id));

    let mut stack = Vec::new();
    let page = layout.get_file_list(&mut stack, 100).unwrap();
    assert_eq!(page.files.len(), 1);
    assert_eq!(page.files[0].file_id, file_id);

    layout.delete_file(file_id, true).unwrap();
    assert!(!layout.file_exists(file_id));

    // Only the version tag remains under the root.
    let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec![".version".to_string()]);
}

/// Reopening a root written by this layout succeeds; a root written by an
/// unknown layout version is refused.
#[test]
fn layout_version_compatibility() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("objs");

    open_layout(&root, false);
    assert_eq!(fs::read(root.join(".version")).unwrap(), 2i32.to_be_bytes());
    open_layout(&root, false);

    fs::write(root.join(".version"), 7i32.to_be_bytes()).unwrap();
    let config = LayoutConfig::new(&root);
    assert!(StorageLayout::open(&config, &ChecksumFactory::default()).is_err());
}

/// Padding objects survive reload: a zero-length last object is accounted
/// as a full stripe.
#[test]
fn padding_object_accounting() {
    let temp_dir = TempDir::new().unwrap();
    let layout = open_layout(temp_dir.path(), false);
    let mut md = fresh_md();
    let mut cow = CowPolicy::no_cow();

    layout
        .write_object("P", &mut md, &payload(STRIPE, 1), 0, 0, 1, 0, false, &mut cow)
        .unwrap();
    layout.create_padding_object("P", &mut md, 1, 1, 0, 0).unwrap();

    let loaded = layout
        .load_file_metadata("P", Arc::new(Raid0::new(STRIPE)))
        .unwrap();
    assert_eq!(loaded.file_size(), 2 * STRIPE as u64);

    let pad = loaded.version_manager().largest_version(1).unwrap();
    let info = layout.read_object("P", &loaded, &pad, 0, None).unwrap();
    assert_eq!(info.status, ObjectStatus::PaddingObject);
    assert_eq!(info.stripe_size, STRIPE);
}
