//! Error types for osd-layout.
//!
//! This module defines all error types used throughout the storage layout,
//! using a combination of `thiserror` for ergonomic error definitions and
//! `miette` for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors derive from [`LayoutError`]
//! - Each variant includes helpful error messages and diagnostic codes
//! - Context is preserved through the error chain
//! - Errors are automatically converted to `miette::Result` for CLI output
//!
//! Not every fault becomes an error value: a requested object version that
//! is absent from the version index is converted to a `DoesNotExist` read
//! result at the read entry point, and unparseable object filenames
//! encountered during enumeration are logged and skipped rather than
//! propagated.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur in storage layout operations
#[derive(Error, Debug, Diagnostic)]
pub enum LayoutError {
    /// File system I/O error during a layout operation.
    ///
    /// Common causes: permission denied, file not found, disk full,
    /// or memory mapping failures. Used throughout for object file
    /// operations, directory traversal, and metadata access.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(osd_layout::io_error))]
    Io {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Unable to create file directory or object.
    ///
    /// Raised when `fs::create_dir_all()` on a file's hashed directory or
    /// the creation of a new object file fails. Distinct from [`Io`]
    /// because callers treat create-time failures as a hard fault of the
    /// storage volume.
    ///
    /// [`Io`]: LayoutError::Io
    #[error("unable to create file directory or object '{path}'")]
    #[diagnostic(
        code(osd_layout::create_failed),
        help("Check permissions and free space on the storage volume.")
    )]
    CreateFailed {
        /// The directory or object path that couldn't be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An object filename does not match any known on-disk format.
    ///
    /// Object filenames are 32, 48 or 64 lowercase hex characters. Anything
    /// else in a file directory is either a dotted metadata file or an
    /// illegal leftover. During enumeration such names are logged and
    /// skipped; this error is only surfaced when a caller asks to decode a
    /// specific name.
    #[error("illegal object filename '{name}'")]
    #[diagnostic(
        code(osd_layout::invalid_object_name),
        help("Object filenames are 32, 48 or 64 lowercase hex characters.")
    )]
    InvalidObjectName {
        /// The filename that couldn't be decoded
        name: String,
    },

    /// A requested object version is not present in the version index.
    ///
    /// Depending on the entry point this is either surfaced (delete of an
    /// exact version) or converted to a `DoesNotExist` read result.
    #[error("no version of object {object_number} of file '{file_id}' matches the request")]
    #[diagnostic(code(osd_layout::version_not_found))]
    VersionNotFound {
        /// The file the lookup ran against
        file_id: String,
        /// The object number that was looked up
        object_number: u64,
    },

    /// The storage root carries an incompatible layout version tag.
    ///
    /// The current layout version is 2; version 1 (the legacy int-version
    /// layout) is still accepted. Any other tag means the directory tree
    /// was written by an unknown layout and must not be touched.
    #[error("incompatible storage layout version {found}")]
    #[diagnostic(
        code(osd_layout::incompatible_layout),
        help("This build reads layout versions 1 and 2. Migrate the storage root first.")
    )]
    IncompatibleLayout {
        /// The version tag found in the storage root
        found: i32,
    },

    /// A per-file metadata file has malformed contents.
    ///
    /// Raised when `.tepoch`, `.mepoch` or `.tlog` exists but is shorter
    /// than its fixed frame or fails to deserialize. The object files
    /// themselves are unaffected; removing the metadata file resets the
    /// value to its documented default.
    #[error("corrupt metadata file '{path}': {message}")]
    #[diagnostic(
        code(osd_layout::corrupt_metadata),
        help("Delete the metadata file to reset it to its default value.")
    )]
    CorruptMetadata {
        /// The metadata file that couldn't be read
        path: PathBuf,
        /// Description of what was malformed
        message: String,
    },

    /// Failed to serialize the truncate log.
    ///
    /// Occurs in `set_truncate_log()` when rkyv serialization fails. This
    /// is typically an internal error.
    #[error("failed to serialize truncate log")]
    #[diagnostic(code(osd_layout::tlog_serialization_error))]
    TruncateLogSerialization(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, LayoutError>;

impl LayoutError {
    /// Wrap an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LayoutError {
        let path = path.into();
        move |source| LayoutError::Io { path, source }
    }

    /// Wrap a create-time I/O error with the path it occurred on.
    pub(crate) fn create(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LayoutError {
        let path = path.into();
        move |source| LayoutError::CreateFailed { path, source }
    }
}
