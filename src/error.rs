// src/error.rs

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Core error types for pkgport
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors without a known path
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// I/O errors on a specific path
    #[error("{}: {source}", path.display())]
    PathIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The package name/version is already recorded in the database
    #[error("Package {name}/{version} is already installed")]
    AlreadyInstalled { name: String, version: String },

    /// Candidate files collide with the filesystem or other packages
    #[error("Files conflict: {message}: {context}")]
    FilesConflict { message: String, context: String },

    /// Another owner holds the database lock directory
    #[error("Package database already locked: {}", .0.display())]
    DbAlreadyLocked(PathBuf),

    /// A confirmation prompt was declined
    #[error("Aborted by user")]
    AbortedByUser,

    /// The script engine exited while a response was expected
    #[error("Shell process died: {0}")]
    ProcessDied(String),

    /// A glob pattern matched nothing
    #[error("No match for pattern: {0}")]
    NoMatch(String),

    /// Directory traversal failed while expanding a glob
    #[error("Glob aborted: {0}")]
    GlobAborted(String),

    /// Malformed glob pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A required path does not exist
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// A relative path tried to escape its root
    #[error("Path escapes root: {0}")]
    PathTraversal(String),

    /// Package directory is missing metadata or is malformed
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    /// Interruption signal observed at a checkpoint
    #[error("Interrupted by signal during {0}")]
    Interrupted(String),

    /// System call errors from nix
    #[error("System error: {0}")]
    Sys(#[from] nix::Error),

    /// Build user could not be resolved
    #[error("Unknown user: {0}")]
    UnknownUser(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on
    pub fn at(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::PathIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Attach a path to `io::Result` values
pub(crate) trait IoContext<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::at(path, e))
    }
}

/// Result type alias using pkgport's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_io_mentions_path() {
        let err: Result<()> = Err(io::Error::from(io::ErrorKind::NotFound)).at_path("/tmp/missing");
        let message = err.unwrap_err().to_string();
        assert!(message.starts_with("/tmp/missing: "));
    }

    #[test]
    fn test_already_installed_message() {
        let err = Error::AlreadyInstalled {
            name: "foo".to_string(),
            version: "1.0".to_string(),
        };
        assert_eq!(err.to_string(), "Package foo/1.0 is already installed");
    }
}
