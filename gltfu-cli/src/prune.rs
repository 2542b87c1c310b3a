//! `gltfu prune` - remove unreferenced resources.

use crate::output::{load_document, store_document, OutputOptions};
use anyhow::Result;
use clap::Args;
use gltfu_core::prune::{self, PruneOptions};
use gltfu_core::ProgressReporter;
use std::path::PathBuf;

#[derive(Args)]
pub struct PruneArgs {
    /// Input glTF file
    pub input: PathBuf,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Keep empty leaf nodes
    #[arg(long)]
    pub keep_leaves: bool,

    /// Keep unused vertex attributes
    #[arg(long)]
    pub keep_attributes: bool,

    /// Prevent pruning properties with custom extras
    #[arg(long)]
    pub keep_extras: bool,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: PruneArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report(
        "prune",
        "Loading file",
        0.0,
        &args.input.display().to_string(),
    );
    let mut document = load_document(&args.input)?;

    progress.report("prune", "Pruning unused resources", 0.3, "");
    let summary = prune::process(
        &mut document,
        PruneOptions {
            keep_leaves: args.keep_leaves,
            keep_attributes: args.keep_attributes,
            keep_extras: args.keep_extras,
        },
    );

    let details = if summary.total() > 0 {
        let mut parts = Vec::new();
        for (label, count) in [
            ("nodes", summary.nodes),
            ("meshes", summary.meshes),
            ("materials", summary.materials),
            ("accessors", summary.accessors),
            ("textures", summary.textures),
            ("images", summary.images),
            ("samplers", summary.samplers),
            ("buffer views", summary.buffer_views),
            ("buffers", summary.buffers),
            ("skins", summary.skins),
            ("cameras", summary.cameras),
        ] {
            if count > 0 {
                parts.push(format!("{label}: {count}"));
            }
        }
        format!("removed {}", parts.join(", "))
    } else {
        "no unused resources found".to_string()
    };
    progress.report("prune", "Prune complete", 0.7, &details);

    progress.report(
        "prune",
        "Writing output",
        0.9,
        &args.output.display().to_string(),
    );
    store_document(&document, &args.output, &args.out)?;

    progress.success("prune", &format!("Written to: {}", args.output.display()));
    Ok(())
}
