//! Command-line interface definitions for the `osd-layout` binary.
//!
//! This module defines the CLI structure using clap, including all
//! subcommands and their arguments. The main entry point is the [`Cli`]
//! struct.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Main command-line interface for the storage-root inspection tool.
#[derive(Parser)]
#[command(
    name = "osd-layout",
    bin_name = "osd-layout",
    author,
    version,
    about = "Inspect the object storage root of a striped OSD",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Global options that apply to all subcommands.
#[derive(Parser)]
pub struct GlobalOpts {
    /// Path to the storage root
    #[arg(
        long,
        global = true,
        default_value = "objs",
        env = "OSD_LAYOUT_STORAGE_ROOT"
    )]
    storage_root: PathBuf,

    /// Stripe size in KiB assumed when reconstructing file metadata
    #[arg(
        long,
        global = true,
        default_value_t = 128,
        env = "OSD_LAYOUT_STRIPE_SIZE_KB"
    )]
    stripe_size_kb: usize,
}

impl GlobalOpts {
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn stripe_size_kb(&self) -> usize {
        self.stripe_size_kb
    }
}

/// The available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// List stored files with their estimated sizes
    List {
        /// Directory-walk page size
        #[arg(long, default_value_t = 1000)]
        page_size: usize,
    },

    /// Show a file's reconstructed metadata
    Stat {
        /// The file-id to inspect
        file_id: String,
    },

    /// Print the relative directory a file-id maps to
    Path {
        /// The file-id to resolve
        file_id: String,
    },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    pub fn command(&self) -> &Commands {
        &self.command
    }
}
