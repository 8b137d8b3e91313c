//! Implementation of the `osd-layout` subcommands.

use std::sync::Arc;

use crate::checksum::ChecksumFactory;
use crate::cli::{Cli, Commands};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::layout::StorageLayout;
use crate::striping::Raid0;

/// Execute the subcommand selected on the command line.
pub fn execute(cli: &Cli) -> Result<()> {
    // Inspection never verifies payloads, so checksums stay off even on
    // roots written with them; the encoded checksums are still printed.
    let config = LayoutConfig::new(cli.global_opts().storage_root());
    let layout = StorageLayout::open(&config, &ChecksumFactory::default())?;

    match cli.command() {
        Commands::List { page_size } => list(&layout, *page_size),
        Commands::Stat { file_id } => stat(&layout, file_id, cli.global_opts().stripe_size_kb()),
        Commands::Path { file_id } => {
            println!("{}", layout.relative_file_directory(file_id));
            Ok(())
        }
    }
}

fn list(layout: &StorageLayout, page_size: usize) -> Result<()> {
    let mut stack = Vec::new();
    let mut total = 0usize;
    loop {
        let page = layout.get_file_list(&mut stack, page_size)?;
        for entry in &page.files {
            println!("{}\t{}\t{} KiB/object", entry.file_id, entry.size, entry.object_size_kb);
        }
        total += page.files.len();
        if !page.has_more {
            break;
        }
    }
    println!("{total} file(s)");
    Ok(())
}

fn stat(layout: &StorageLayout, file_id: &str, stripe_size_kb: usize) -> Result<()> {
    if !layout.file_exists(file_id) {
        println!("{file_id}: not stored here");
        return Ok(());
    }

    let policy = Arc::new(Raid0::with_stripe_size_kb(stripe_size_kb));
    let md = layout.load_file_metadata(file_id, policy)?;

    println!("file:               {file_id}");
    println!("directory:          {}", layout.relative_file_directory(file_id));
    println!("file size:          {}", md.file_size());
    println!("last object:        {}", md.last_object_number());
    println!("truncate epoch:     {}", md.truncate_epoch());
    println!("master epoch:       {}", layout.get_master_epoch(file_id)?);
    println!(
        "versioning:         {}",
        if md.version_manager().is_versioning_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let truncate_log = layout.get_truncate_log(file_id)?;
    println!("truncate records:   {}", truncate_log.records.len());

    if let Some(last) = md.version_manager().last_object_id() {
        for object_number in 0..=last {
            if let Some(info) = md.version_manager().largest_version(object_number) {
                println!(
                    "object {object_number}: version {} timestamp {} checksum {:#018x}",
                    info.version, info.timestamp, info.checksum
                );
            }
        }
    }
    Ok(())
}
