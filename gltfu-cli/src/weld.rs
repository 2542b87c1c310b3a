//! `gltfu weld` - merge identical vertices.

use crate::output::{load_document, store_document, OutputOptions};
use anyhow::Result;
use clap::Args;
use gltfu_core::weld::{self, WeldOptions};
use gltfu_core::ProgressReporter;
use std::path::PathBuf;

#[derive(Args)]
pub struct WeldArgs {
    /// Input glTF file
    pub input: PathBuf,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Overwrite existing indices with optimized version
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: WeldArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report(
        "weld",
        "Loading file",
        0.0,
        &args.input.display().to_string(),
    );
    let mut document = load_document(&args.input)?;

    progress.report("weld", "Welding vertices", 0.3, "");
    let summary = weld::process(
        &mut document,
        WeldOptions {
            overwrite: args.overwrite,
        },
    );
    progress.report(
        "weld",
        "Weld complete",
        0.7,
        &format!(
            "welded {} primitives ({} -> {} vertices)",
            summary.primitives_welded, summary.vertices_before, summary.vertices_after
        ),
    );

    progress.report(
        "weld",
        "Writing output",
        0.9,
        &args.output.display().to_string(),
    );
    store_document(&document, &args.output, &args.out)?;

    progress.success("weld", &format!("Written to: {}", args.output.display()));
    Ok(())
}
