//! Error types for archive assembly.

use std::path::PathBuf;

/// Errors that abort archive assembly.
///
/// Every variant is fatal: the archive at the destination path is only
/// replaced once the whole archive has been written successfully.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Reading an input file or writing the archive failed.
    #[error("archive I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The ZIP encoder or decoder rejected an operation.
    #[error("zip error on entry '{entry}': {source}")]
    Zip {
        /// Name of the entry being processed (empty for archive-level errors).
        entry: String,
        /// The underlying ZIP error.
        source: zip::result::ZipError,
    },

    /// An entry name is not a valid relative, forward-slash archive path.
    #[error("invalid archive entry name '{name}': {reason}")]
    InvalidEntryName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(entry: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            entry: entry.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = ArchiveError::io(
            "build/core.jar",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("archive I/O error"));
        assert!(msg.contains("core.jar"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn zip_error_display() {
        let err = ArchiveError::zip("com/x/A.class", zip::result::ZipError::FileNotFound);
        let msg = err.to_string();
        assert!(msg.contains("zip error on entry 'com/x/A.class'"));
    }

    #[test]
    fn invalid_name_display() {
        let err = ArchiveError::InvalidEntryName {
            name: "../escape.txt".to_string(),
            reason: "must not contain '..'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid archive entry name '../escape.txt': must not contain '..'"
        );
    }
}
