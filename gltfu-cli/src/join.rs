//! `gltfu join` - join compatible primitives.

use crate::output::{load_document, store_document, OutputOptions};
use anyhow::Result;
use clap::Args;
use gltfu_core::join::{self, JoinOptions};
use gltfu_core::ProgressReporter;
use std::path::PathBuf;

#[derive(Args)]
pub struct JoinArgs {
    /// Input glTF file
    pub input: PathBuf,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Keep meshes separate (only join primitives within same mesh)
    #[arg(long)]
    pub keep_meshes: bool,

    /// Keep named meshes and nodes separate
    #[arg(long)]
    pub keep_named: bool,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: JoinArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report(
        "join",
        "Loading file",
        0.0,
        &args.input.display().to_string(),
    );
    let mut document = load_document(&args.input)?;

    progress.report("join", "Joining primitives", 0.3, "");
    let summary = join::process(
        &mut document,
        JoinOptions {
            keep_meshes: args.keep_meshes,
            keep_named: args.keep_named,
        },
    );
    let details = if summary.groups_merged > 0 {
        format!(
            "meshes modified: {}, groups merged: {}, primitives removed: {}",
            summary.meshes_modified, summary.groups_merged, summary.primitives_removed
        )
    } else {
        "no compatible primitives found".to_string()
    };
    progress.report("join", "Join complete", 0.7, &details);

    progress.report(
        "join",
        "Writing output",
        0.9,
        &args.output.display().to_string(),
    );
    store_document(&document, &args.output, &args.out)?;

    progress.success("join", &format!("Written to: {}", args.output.display()));
    Ok(())
}
