//! Error types for fingerprinting and store operations.

use std::path::PathBuf;

/// Errors that can occur while fingerprinting files or persisting fingerprints.
///
/// Files that simply do not exist when a pattern is expanded are not errors;
/// they are left out of the file set. Only failures that make the result
/// untrustworthy surface here.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing the store.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A file was present when the file set was expanded but could not be
    /// read while digesting it.
    #[error("input changed while fingerprinting {path}: {source}")]
    StaleInput {
        /// The file that vanished or became unreadable.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A path pattern could not be compiled into a glob matcher.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        /// Description of the problem.
        reason: String,
    },
}
