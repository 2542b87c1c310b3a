//! `gltfu merge` - concatenate multiple glTF files into one.

use crate::output::OutputOptions;
use anyhow::{Context, Result};
use clap::Args;
use gltfu_core::{Merger, ProgressReporter};
use std::path::PathBuf;
use tracing::warn;

#[derive(Args)]
pub struct MergeArgs {
    /// Input glTF files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Keep all scenes as separate scenes in output (default: merge into one scene)
    #[arg(long)]
    pub keep_scenes: bool,

    /// Merge only default scenes from each file (default: merge all scenes)
    #[arg(long)]
    pub default_scene_only: bool,

    /// Specific scene indices to merge (not yet implemented)
    #[arg(long)]
    pub scenes: Vec<usize>,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: MergeArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report(
        "merge",
        &format!("Starting merge of {} file(s)", args.inputs.len()),
        0.0,
        "",
    );

    let mut merger = Merger::new();
    for (index, input) in args.inputs.iter().enumerate() {
        progress.report(
            "merge",
            &format!("Loading and merging file {}/{}", index + 1, args.inputs.len()),
            index as f64 / args.inputs.len() as f64,
            &input.display().to_string(),
        );

        let warnings = merger
            .load_and_merge_file(input, args.keep_scenes, args.default_scene_only)
            .with_context(|| format!("Failed to merge {}", input.display()))?;
        for warning in warnings {
            warn!(input = %input.display(), "{warning}");
        }
    }

    if !args.scenes.is_empty() {
        progress.report(
            "merge",
            "Warning: --scenes option not yet implemented",
            0.9,
            "",
        );
    }

    progress.report(
        "merge",
        "Saving output",
        0.75,
        &args.output.display().to_string(),
    );
    merger
        .save(&args.output, args.out.store_options(&args.output))
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    progress.success(
        "merge",
        &format!("Successfully merged to: {}", args.output.display()),
    );
    Ok(())
}
