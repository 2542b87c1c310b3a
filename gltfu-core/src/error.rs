//! Error types for document loading, storing, and transforms.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading, transforming, or storing a document.
#[derive(Debug, Error)]
pub enum GltfError {
    /// Underlying file I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON chunk or .gltf file failed to parse.
    #[error("Failed to parse glTF JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// GLB container is malformed.
    #[error("Invalid GLB container: {0}")]
    InvalidGlb(String),

    /// A data URI could not be decoded.
    #[error("Invalid data URI in buffer {index}: {reason}")]
    InvalidDataUri { index: usize, reason: String },

    /// An index points outside its target table.
    #[error("Dangling {kind} index {index} (table size {len})")]
    DanglingIndex {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    /// An accessor's byte range does not fit its buffer.
    #[error("Accessor {index} reads past the end of its buffer")]
    AccessorOutOfBounds { index: usize },

    /// A pass could make no progress at all.
    #[error("{operation} failed: {reason}")]
    PassFailed {
        operation: &'static str,
        reason: String,
    },

    /// Compression requested without a linked encoder.
    #[error("Draco compression is not enabled. Rebuild with an encoder linked in.")]
    CompressionUnavailable,
}

impl GltfError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn pass_failed(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::PassFailed {
            operation,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GltfError>;
