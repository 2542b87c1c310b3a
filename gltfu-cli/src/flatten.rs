//! `gltfu flatten` - bake the node hierarchy.

use crate::output::{load_document, store_document, OutputOptions};
use anyhow::Result;
use clap::Args;
use gltfu_core::{flatten, ProgressReporter};
use std::path::PathBuf;

#[derive(Args)]
pub struct FlattenArgs {
    /// Input glTF file
    pub input: PathBuf,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Skip removal of empty leaf nodes
    #[arg(long)]
    pub no_cleanup: bool,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: FlattenArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report(
        "flatten",
        "Loading file",
        0.0,
        &args.input.display().to_string(),
    );
    let mut document = load_document(&args.input)?;

    progress.report("flatten", "Flattening scene graph", 0.3, "");
    let flattened = flatten::process(&mut document, !args.no_cleanup)?;
    progress.report(
        "flatten",
        "Flattened nodes",
        0.7,
        &format!("{flattened} nodes"),
    );

    progress.report(
        "flatten",
        "Writing output",
        0.9,
        &args.output.display().to_string(),
    );
    store_document(&document, &args.output, &args.out)?;

    progress.success(
        "flatten",
        &format!("Written to: {}", args.output.display()),
    );
    Ok(())
}
