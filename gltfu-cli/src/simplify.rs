//! `gltfu simplify` - reduce triangle counts.

use crate::output::{load_document, store_document, OutputOptions};
use anyhow::Result;
use clap::Args;
use gltfu_core::simplify::{self, SimplifyOptions};
use gltfu_core::ProgressReporter;
use std::path::PathBuf;

pub fn parse_ratio(value: &str) -> Result<f32, String> {
    let ratio: f32 = value.parse().map_err(|_| "not a number".to_string())?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{ratio} is not in [0.0, 1.0]"))
    }
}

pub fn parse_positive(value: &str) -> Result<f32, String> {
    let number: f32 = value.parse().map_err(|_| "not a number".to_string())?;
    if number > 0.0 {
        Ok(number)
    } else {
        Err(format!("{number} is not positive"))
    }
}

#[derive(Args)]
pub struct SimplifyArgs {
    /// Input glTF file
    pub input: PathBuf,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Target ratio of triangles to keep (0.0-1.0, default 0.5)
    #[arg(short, long, default_value_t = 0.5, value_parser = parse_ratio)]
    pub ratio: f32,

    /// Maximum error threshold (default 0.01)
    #[arg(short, long, default_value_t = 0.01, value_parser = parse_positive)]
    pub error: f32,

    /// Lock border vertices to prevent mesh from shrinking
    #[arg(short, long)]
    pub lock_border: bool,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: SimplifyArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report(
        "simplify",
        "Loading file",
        0.0,
        &args.input.display().to_string(),
    );
    let mut document = load_document(&args.input)?;

    progress.report(
        "simplify",
        "Simplifying meshes",
        0.3,
        &format!("ratio={}, error={}", args.ratio, args.error),
    );
    let summary = simplify::process(
        &mut document,
        SimplifyOptions {
            ratio: args.ratio,
            error: args.error,
            lock_border: args.lock_border,
        },
    );

    for report in &summary.reports {
        if let Some(reason) = &report.skip_reason {
            progress.report(
                "simplify",
                "Skipped primitive",
                -1.0,
                &format!("{}:{} ({reason})", report.mesh, report.primitive),
            );
        } else {
            progress.report(
                "simplify",
                "Simplified primitive",
                -1.0,
                &format!(
                    "{}:{} {} -> {} triangles, error {:.6}",
                    report.mesh,
                    report.primitive,
                    report.original_triangles,
                    report.simplified_triangles,
                    report.error
                ),
            );
        }
    }
    progress.report(
        "simplify",
        "Simplification complete",
        0.7,
        &format!(
            "{}/{} primitives simplified ({} skipped)",
            summary.simplified, summary.total_primitives, summary.skipped
        ),
    );

    progress.report(
        "simplify",
        "Writing output",
        0.9,
        &args.output.display().to_string(),
    );
    store_document(&document, &args.output, &args.out)?;

    progress.success(
        "simplify",
        &format!("Written to: {}", args.output.display()),
    );
    Ok(())
}
