//! `gltfu optim` - the full optimization pipeline.
//!
//! Fixed pass order: merge -> dedupe -> flatten -> join -> weld ->
//! [simplify] -> [compress] -> prune -> bounds -> write. Every step short of
//! the final write is opt-out; the first failing pass aborts the run.

use crate::output::{load_document, store_document, OutputOptions};
use crate::simplify::{parse_positive, parse_ratio};
use anyhow::{Context, Result};
use clap::Args;
use gltfu_core::dedupe::{self, DedupeOptions};
use gltfu_core::join::{self, JoinOptions};
use gltfu_core::prune::{self, PruneOptions};
use gltfu_core::simplify::{self, SimplifyOptions};
use gltfu_core::weld::{self, WeldOptions};
use gltfu_core::{bounds, flatten, GltfError, Merger, ProgressReporter};
use std::path::PathBuf;
use tracing::warn;

#[derive(Args)]
pub struct OptimArgs {
    /// Input glTF file(s) to optimize
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output glTF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Apply mesh simplification
    #[arg(long)]
    pub simplify: bool,

    /// Target ratio for simplification (default: 0.75)
    #[arg(long, default_value_t = 0.75, value_parser = parse_ratio)]
    pub simplify_ratio: f32,

    /// Error threshold for simplification (default: 0.01)
    #[arg(long, default_value_t = 0.01, value_parser = parse_positive)]
    pub simplify_error: f32,

    /// Lock border vertices during simplification
    #[arg(long)]
    pub simplify_lock_border: bool,

    /// Apply Draco mesh compression
    #[arg(long)]
    pub compress: bool,

    /// Quantization bits for positions (default: 14)
    #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(u32).range(10..=16))]
    pub compress_position_bits: u32,

    /// Quantization bits for normals (default: 10)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(8..=12))]
    pub compress_normal_bits: u32,

    /// Quantization bits for texture coordinates (default: 12)
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(10..=14))]
    pub compress_texcoord_bits: u32,

    /// Quantization bits for colors (default: 8)
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(6..=10))]
    pub compress_color_bits: u32,

    /// Skip deduplication pass
    #[arg(long)]
    pub skip_dedupe: bool,

    /// Skip scene flattening pass
    #[arg(long)]
    pub skip_flatten: bool,

    /// Skip primitive joining pass
    #[arg(long)]
    pub skip_join: bool,

    /// Skip vertex welding pass
    #[arg(long)]
    pub skip_weld: bool,

    /// Skip unused resource pruning pass
    #[arg(long)]
    pub skip_prune: bool,

    /// Show detailed optimization statistics
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub out: OutputOptions,
}

pub fn execute(args: OptimArgs, progress: &ProgressReporter) -> Result<()> {
    progress.report("optim", "Starting optimization pipeline", 0.0, "");

    // Step 1: load, merging multiple inputs into one document.
    let mut document = if args.inputs.len() > 1 {
        progress.report(
            "optim",
            &format!("Step 1: Merging {} files", args.inputs.len()),
            0.05,
            "",
        );

        let mut merger = Merger::new();
        for (index, input) in args.inputs.iter().enumerate() {
            progress.report(
                "optim",
                &format!("Merging file {}/{}", index + 1, args.inputs.len()),
                0.05 + 0.05 * index as f64 / args.inputs.len() as f64,
                "",
            );
            let warnings = merger
                .load_and_merge_file(input, false, false)
                .with_context(|| format!("Merge failed for {}", input.display()))?;
            for warning in warnings {
                warn!(input = %input.display(), "{warning}");
            }
        }

        progress.report("optim", "Extracting merged model", 0.10, "");
        merger.into_document()
    } else {
        progress.report("optim", "Loading input file", 0.05, "");
        load_document(&args.inputs[0])?
    };

    // Step 2: dedupe.
    if !args.skip_dedupe {
        progress.report("optim", "Step 2: Deduplicating resources", 0.15, "");
        let options = DedupeOptions {
            progress: Some(progress),
            ..Default::default()
        };
        let summary = dedupe::process(&mut document, &options);
        if args.verbose && !summary.stats.is_empty() {
            print!("{}", summary.stats);
        }
    }

    // Step 3: flatten.
    if !args.skip_flatten {
        progress.report("optim", "Step 3: Flattening scene graph", 0.30, "");
        let flattened = flatten::process(&mut document, true)?;
        if args.verbose {
            println!("  Flattened {flattened} nodes");
        }
    }

    // Step 4: join.
    if !args.skip_join {
        progress.report("optim", "Step 4: Joining compatible primitives", 0.45, "");
        let summary = join::process(&mut document, JoinOptions::default());
        if args.verbose && summary.groups_merged > 0 {
            println!(
                "  Joined {} groups ({} primitives removed)",
                summary.groups_merged, summary.primitives_removed
            );
        }
    }

    // Step 5: weld.
    if !args.skip_weld {
        progress.report("optim", "Step 5: Welding identical vertices", 0.60, "");
        let summary = weld::process(&mut document, WeldOptions { overwrite: true });
        if args.verbose && summary.primitives_welded > 0 {
            println!(
                "  Welded {} primitives ({} -> {} vertices)",
                summary.primitives_welded, summary.vertices_before, summary.vertices_after
            );
        }
    }

    // Step 6: simplify (optional).
    if args.simplify {
        progress.report("optim", "Step 6: Simplifying meshes", 0.75, "");
        let summary = simplify::process(
            &mut document,
            SimplifyOptions {
                ratio: args.simplify_ratio,
                error: args.simplify_error,
                lock_border: args.simplify_lock_border,
            },
        );
        if args.verbose {
            println!(
                "  Simplified {}/{} primitives ({} skipped)",
                summary.simplified, summary.total_primitives, summary.skipped
            );
        }
    }

    // Step 6.5: compress (optional). The codec is an external encoder; this
    // build has none linked in.
    if args.compress {
        progress.report("optim", "Step 6.5: Compressing meshes", 0.84, "");
        return Err(GltfError::CompressionUnavailable.into());
    }

    // Step 7: prune.
    if !args.skip_prune {
        progress.report("optim", "Step 7: Pruning unused resources", 0.87, "");
        let summary = prune::process(&mut document, PruneOptions::default());
        if args.verbose && summary.total() > 0 {
            println!("  Pruned {} resources", summary.total());
        }
    }

    // Step 8: recompute position bounds.
    progress.report("optim", "Computing accessor bounds", 0.93, "");
    let bounds_updated = bounds::compute_all_bounds(&mut document);
    if args.verbose && bounds_updated > 0 {
        println!("  Computed bounds for {bounds_updated} accessors");
    }

    // Final step: write.
    progress.report("optim", "Writing optimized output", 0.95, "");
    store_document(&document, &args.output, &args.out)?;

    progress.success(
        "optim",
        &format!("Optimization complete: {}", args.output.display()),
    );
    Ok(())
}
