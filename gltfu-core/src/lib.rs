//! Core library of the `gltfu` glTF optimizer.
//!
//! The document ([`document::Document`]) is a set of parallel tables with
//! integer cross-references and inline buffer bytes. Transform passes take
//! exclusive mutable access to one document and run to completion:
//!
//! - [`merge`]: streaming concatenation of documents
//! - [`dedupe`]: hash-bucketed duplicate removal
//! - [`flatten`]: bake parent transforms into descendants
//! - [`join`]: concatenate compatible primitives
//! - [`weld`]: merge bitwise-identical vertices
//! - [`simplify`]: quadric-error triangle reduction
//! - [`compress`]: splice an external encoder's output
//! - [`prune`]: reachability-based removal
//! - [`bounds`]: recompute position min/max
//!
//! Shared plumbing lives in [`accessor`] (strided reads, fresh allocation)
//! and [`remap`] (reference walking and table compaction). [`io`] moves
//! documents between memory and `.gltf`/`.glb` files.

pub mod accessor;
pub mod bounds;
pub mod compress;
pub mod dedupe;
pub mod document;
pub mod error;
pub mod flatten;
pub mod info;
pub mod io;
pub mod join;
pub mod math;
pub mod merge;
pub mod progress;
pub mod prune;
pub mod remap;
pub mod simplify;
pub mod weld;

pub use document::Document;
pub use error::{GltfError, Result};
pub use io::{is_glb_path, load, store, StoreOptions};
pub use merge::Merger;
pub use progress::{ProgressFormat, ProgressReporter};
