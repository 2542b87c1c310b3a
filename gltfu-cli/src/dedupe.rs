//! `gltfu dedupe` - remove duplicate resources.

use crate::output::{load_document, store_document, OutputOptions};
use anyhow::Result;
use clap::Args;
use gltfu_core::dedupe::{self, DedupeOptions};
use gltfu_core::ProgressReporter;
use std::path::PathBuf;

#[derive(Args)]
pub struct DedupeArgs {
    /// Input glTF file
    pub input: PathBuf,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Remove duplicate accessors (default: true)
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    pub accessors: bool,

    /// Remove duplicate meshes (default: true)
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    pub meshes: bool,

    /// Remove duplicate materials (default: true)
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    pub materials: bool,

    /// Remove duplicate textures and images (default: true)
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    pub textures: bool,

    /// Keep resources with unique names even if they are duplicates
    #[arg(long)]
    pub keep_unique_names: bool,

    /// Print detailed statistics
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: DedupeArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report(
        "dedupe",
        "Loading file",
        0.0,
        &args.input.display().to_string(),
    );
    let mut document = load_document(&args.input)?;

    progress.report("dedupe", "File loaded, starting deduplication", 0.2, "");
    let options = DedupeOptions {
        accessors: args.accessors,
        meshes: args.meshes,
        materials: args.materials,
        textures: args.textures,
        keep_unique_names: args.keep_unique_names,
        progress: Some(progress),
    };
    let summary = dedupe::process(&mut document, &options);

    if !summary.stats.is_empty() {
        progress.report(
            "dedupe",
            "Deduplication complete",
            0.9,
            summary.stats.trim_end(),
        );
    }
    if args.verbose {
        print!("{}", summary.stats);
    }

    progress.report(
        "dedupe",
        "Saving output",
        0.95,
        &args.output.display().to_string(),
    );
    store_document(&document, &args.output, &args.out)?;

    progress.success(
        "dedupe",
        &format!("Successfully deduplicated to: {}", args.output.display()),
    );
    Ok(())
}
