//! Error types for the installer engine

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the installer engine
#[derive(Error, Debug)]
pub enum Error {
    /// An expected structural element is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server selection index does not address a discovered server block
    #[error("Invalid server selection {index}: {available} server block(s) available")]
    AmbiguousSelection { index: usize, available: usize },

    /// Prerender location requested without a token
    #[error("Prerender token is required to proceed")]
    MissingToken,

    /// Modification attempted without a valid backup
    #[error("Unsafe to proceed: backup {} is missing or empty", .path.display())]
    BackupUnsafe { path: PathBuf },

    /// Read, write or copy failure
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document was reported with a non-ok parse status
    #[error("Skipped {}: {}", .path.display(), .errors.join("; "))]
    ParseSkipped { path: PathBuf, errors: Vec<String> },

    /// Rollback after a failed modification did not complete
    #[error(
        "{cause}; restoring the backup failed for {}: manual intervention required",
        failed_paths(.failures)
    )]
    RollbackFailed {
        cause: Box<Error>,
        failures: Vec<(PathBuf, std::io::Error)>,
    },

    /// Installer configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

fn failed_paths(failures: &[(PathBuf, std::io::Error)]) -> String {
    failures
        .iter()
        .map(|(path, e)| format!("{} ({})", path.display(), e))
        .collect::<Vec<_>>()
        .join(", ")
}
