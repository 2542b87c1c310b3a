//! Flags and helpers shared by every file-writing subcommand.

use anyhow::{Context, Result};
use clap::Args;
use gltfu_core::{io, Document, StoreOptions};
use std::path::Path;
use tracing::warn;

/// Output flags common to all writing subcommands.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Embed images in the output file
    #[arg(long)]
    pub embed_images: bool,

    /// Embed buffers in the output file
    #[arg(long)]
    pub embed_buffers: bool,

    /// Disable pretty-printing of JSON
    #[arg(long = "no-pretty-print")]
    pub no_pretty_print: bool,

    /// Write binary glTF (.glb) format (auto-detected from .glb extension)
    #[arg(short = 'b', long)]
    pub binary: bool,
}

impl OutputOptions {
    /// Resolve the store options for a given output path. Binary is selected
    /// by flag or by a `.glb` extension.
    pub fn store_options(&self, output: &Path) -> StoreOptions {
        StoreOptions {
            embed_images: self.embed_images,
            embed_buffers: self.embed_buffers,
            pretty: !self.no_pretty_print,
            binary: self.binary || gltfu_core::is_glb_path(output),
        }
    }
}

/// Load an input document, surfacing loader warnings on the log stream.
pub fn load_document(path: &Path) -> Result<Document> {
    let (document, warnings) =
        io::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
    for warning in warnings {
        warn!(input = %path.display(), "{warning}");
    }
    Ok(document)
}

/// Write a document, honoring the shared output flags.
pub fn store_document(document: &Document, path: &Path, options: &OutputOptions) -> Result<()> {
    io::store(document, path, options.store_options(path))
        .with_context(|| format!("Failed to write {}", path.display()))
}
