//! # osd-layout
//!
//! The on-disk object storage layout of a striped object-storage device
//! (OSD): maps file identifiers and object numbers onto a directory tree
//! on a local filesystem, stores object payloads as individual files,
//! maintains per-object version histories (supporting copy-on-write and
//! optional checksums), and services read, write, truncate, delete and
//! enumeration operations.
//!
//! ## Overview
//!
//! A file's objects live in a leaf directory derived from a deterministic
//! hash of the file-id, fanned out into bounded subdirectories. Each
//! object file's name encodes its object number, version, checksum and
//! copy-on-write timestamp; three historical name formats all decode.
//! Every metadata rewrite goes through a temporary file plus rename, so a
//! crash never corrupts a published version; recovery is a directory
//! scan.
//!
//! ## Architecture
//!
//! - [`layout`]: the storage engine (read / write / truncate / delete /
//!   enumerate), composing everything below
//! - [`PathHasher`]: file-id → relative directory fan-out
//! - [`object_name`]: the object filename codec
//! - [`checksum`]: pluggable 64-bit payload checksums
//! - [`version_manager`]: the per-open-file version index
//! - [`version_log`]: the append-only whole-file snapshot log (`.vlog`)
//! - [`epochs`]: the small per-file metadata files (`.tepoch`, `.mepoch`,
//!   `.tlog`)
//! - [`cow`]: the per-open-file copy-on-write oracle
//! - [`file_metadata`]: the per-open-file metadata record
//! - [`striping`]: the injected striping-policy collaborator
//! - [`config`]: layout configuration
//! - [`error`]: error types with thiserror + miette
//! - [`cli`] / [`commands`]: the `osd-layout` inspection binary
//!
//! ## Concurrency
//!
//! The layout assumes an upstream executor that serializes all operations
//! on the same file-id; operations on distinct file-ids may run in
//! parallel. See the [`layout`] module documentation.
//!
//! ## Library Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use osd_layout::checksum::ChecksumFactory;
//! use osd_layout::config::LayoutConfig;
//! use osd_layout::cow::CowPolicy;
//! use osd_layout::layout::StorageLayout;
//! use osd_layout::striping::Raid0;
//!
//! let config = LayoutConfig::new("/var/lib/osd/objs").with_checksums("blake3");
//! let layout = StorageLayout::open(&config, &ChecksumFactory::default())?;
//!
//! let policy = Arc::new(Raid0::with_stripe_size_kb(128));
//! let mut md = layout.load_file_metadata("volume:42", policy)?;
//! let mut cow = CowPolicy::no_cow();
//! layout.write_object("volume:42", &mut md, b"payload", 0, 0, 1, 0, false, &mut cow)?;
//! # Ok::<(), osd_layout::error::LayoutError>(())
//! ```

pub mod checksum;
pub mod cli;
pub mod commands;
pub mod config;
pub mod cow;
pub mod epochs;
pub mod error;
pub mod file_metadata;
pub mod layout;
pub mod object_name;
pub mod striping;
pub mod version_log;
pub mod version_manager;

mod path_hasher;

pub use path_hasher::{PathHasher, hash32};
