//! gltfu - Memory-efficient glTF operations tool
//!
//! # Commands
//!
//! - `gltfu merge` - Merge multiple glTF files or scenes
//! - `gltfu dedupe` - Remove duplicate data to reduce file size
//! - `gltfu flatten` - Flatten scene graph hierarchy
//! - `gltfu join` - Join compatible primitives to reduce draw calls
//! - `gltfu weld` - Merge identical vertices to reduce geometry size
//! - `gltfu prune` - Remove unused resources not referenced by any scene
//! - `gltfu simplify` - Reduce mesh complexity
//! - `gltfu info` - Display information about a glTF file
//! - `gltfu optim` - Full optimization pipeline
//!
//! Progress streams to stdout as human-readable lines, or one JSON object
//! per line with `--json-progress`. Exit code is nonzero on any failure,
//! with a single error record on the progress stream.

mod dedupe;
mod flatten;
mod info;
mod join;
mod merge;
mod optim;
mod output;
mod prune;
mod simplify;
mod weld;

use clap::{Parser, Subcommand};
use gltfu_core::{ProgressFormat, ProgressReporter};

/// gltfu - Memory-efficient glTF operations tool
#[derive(Parser)]
#[command(name = "gltfu")]
#[command(about = "Memory-efficient glTF operations tool")]
#[command(version)]
struct Cli {
    /// Output progress reports as JSON (one per line)
    #[arg(long, global = true)]
    json_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge multiple glTF files or scenes
    Merge(merge::MergeArgs),

    /// Remove duplicate data to reduce file size
    Dedupe(dedupe::DedupeArgs),

    /// Flatten scene graph hierarchy
    Flatten(flatten::FlattenArgs),

    /// Join compatible primitives to reduce draw calls
    Join(join::JoinArgs),

    /// Merge identical vertices to reduce geometry size
    Weld(weld::WeldArgs),

    /// Remove unused resources not referenced by any scene
    Prune(prune::PruneArgs),

    /// Reduce mesh complexity
    Simplify(simplify::SimplifyArgs),

    /// Display information about a glTF file
    Info(info::InfoArgs),

    /// Optimize glTF files (merge + dedupe + flatten + join + weld + prune)
    Optim(optim::OptimArgs),
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging();

    let progress = ProgressReporter::new(if cli.json_progress {
        ProgressFormat::Json
    } else {
        ProgressFormat::Text
    });

    let (operation, result) = match cli.command {
        Commands::Merge(args) => ("merge", merge::execute(args, &progress)),
        Commands::Dedupe(args) => ("dedupe", dedupe::execute(args, &progress)),
        Commands::Flatten(args) => ("flatten", flatten::execute(args, &progress)),
        Commands::Join(args) => ("join", join::execute(args, &progress)),
        Commands::Weld(args) => ("weld", weld::execute(args, &progress)),
        Commands::Prune(args) => ("prune", prune::execute(args, &progress)),
        Commands::Simplify(args) => ("simplify", simplify::execute(args, &progress)),
        Commands::Info(args) => ("info", info::execute(args, &progress, cli.json_progress)),
        Commands::Optim(args) => ("optim", optim::execute(args, &progress)),
    };

    if let Err(err) = result {
        progress.error(operation, &format!("{err:#}"));
        std::process::exit(1);
    }
}
