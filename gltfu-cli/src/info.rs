//! `gltfu info` - display document statistics.

use anyhow::Result;
use clap::Args;
use gltfu_core::{info, ProgressReporter};
use std::path::PathBuf;

#[derive(Args)]
pub struct InfoArgs {
    /// Input glTF/GLB file
    pub input: PathBuf,

    /// Show detailed information
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(args: InfoArgs, progress: &ProgressReporter, json_progress: bool) -> Result<()> {
    progress.report(
        "info",
        "Analyzing file",
        0.0,
        &args.input.display().to_string(),
    );

    let stats = info::analyze(&args.input)?;
    progress.report("info", "Analysis complete", 1.0, "");

    // The report always lands on stdout, even in JSON-progress mode.
    if !json_progress {
        println!();
    }
    print!("{}", stats.format(args.verbose));
    if !json_progress {
        println!();
    }

    Ok(())
}
