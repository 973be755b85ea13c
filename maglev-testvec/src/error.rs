//! Errors raised while loading or replaying a test vector.

use std::path::PathBuf;

use maglev_core::MaglevError;

/// Test vector errors.
#[derive(Debug, thiserror::Error)]
pub enum TestVecError {
    /// The file could not be read.
    #[error("failed to read test vector {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed.
    #[error("line {line}: {reason}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The group described by the header could not be built.
    #[error(transparent)]
    Maglev(#[from] MaglevError),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, TestVecError>;
