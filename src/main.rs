//! # osd-layout CLI
//!
//! Inspection tool for the object storage root of a striped OSD: list
//! stored files, resolve file-ids to their hashed directories, and dump a
//! file's reconstructed metadata.
//!
//! ## Commands
//!
//! - **list**: walk the storage root and print every stored file with its
//!   estimated size
//! - **stat**: reconstruct one file's metadata from its directory
//! - **path**: print the relative directory a file-id maps to
//!
//! ## Environment Variables
//!
//! - `OSD_LAYOUT_STORAGE_ROOT`: storage root (default: ./objs)
//! - `OSD_LAYOUT_STRIPE_SIZE_KB`: assumed stripe size for stat
//! - `RUST_LOG`: library log filtering (e.g. `warn`, `osd_layout=debug`)

use std::io::IsTerminal;

use osd_layout::cli::Cli;

fn main() -> miette::Result<()> {
    env_logger::init();

    // Install miette's fancy panic and error report handler
    miette::set_panic_hook();

    // Richer error formatting on a TTY, plain output for logs and pipes
    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();
    osd_layout::commands::execute(&cli).map_err(Into::into)
}
