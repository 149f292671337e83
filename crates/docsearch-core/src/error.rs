use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the retrieval pipeline.
///
/// "Nothing matched" is not an error; it is reported through the
/// no-results answer of the query path.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("Cannot build an index from zero chunks")]
    EmptyIndex,

    #[error("No index found at {0}")]
    IndexNotFound(PathBuf),

    #[error("Index at {path} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("Invalid query parameter: {0}")]
    InvalidQueryParameter(String),

    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load { path: path.into(), reason: reason.to_string() }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::IndexCorrupt { path: path.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
