// src/filesystem/mod.rs

//! Filesystem helpers shared by the package database and the ports tree
//!
//! - Root-relative path joining that refuses to escape the root
//! - Newline-delimited list files (package records, targets)
//! - Single-entry removal that handles files, symlinks and empty directories

mod lines;
pub mod path;

pub use lines::{read_first_line, read_lines, write_lines};
pub use path::{root_join, sanitize_path};

use crate::error::{IoContext, Result};
use std::fs;
use std::path::Path;

/// Remove one filesystem entry the way `remove(3)` does
///
/// Directories are removed only when empty. Symlinks are removed, never
/// followed.
pub fn remove_entry(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).at_path(path)?;
    if metadata.is_dir() {
        fs::remove_dir(path).at_path(path)
    } else {
        fs::remove_file(path).at_path(path)
    }
}

/// Remove an entry if present; a missing entry is not an error
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => remove_entry(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(crate::Error::at(path, e)),
    }
}

/// `lstat`-based existence check; dangling symlinks count as present
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_entry_refuses_non_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("share");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("doc"), "x").unwrap();

        assert!(remove_entry(&dir).is_err());
        remove_entry(&dir.join("doc")).unwrap();
        remove_entry(&dir).unwrap();
        assert!(!entry_exists(&dir));
    }

    #[test]
    fn test_remove_if_exists_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(remove_if_exists(&temp_dir.path().join("nothing")).is_ok());
    }

    #[test]
    fn test_entry_exists_dangling_symlink() {
        let temp_dir = tempfile::tempdir().unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink("missing-target", &link).unwrap();
        assert!(entry_exists(&link));
        assert!(!link.exists());
    }
}
