// src/filesystem/path.rs

//! Root-relative path handling
//!
//! Package records and package trees name files relative to an install
//! root. Those names come from files on disk, so they are checked before
//! being joined: absolute prefixes are stripped and `..` is rejected.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize a root-relative path
///
/// ```
/// use pkgport::filesystem::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("/usr/bin/foo").unwrap(), PathBuf::from("usr/bin/foo"));
/// assert!(sanitize_path("usr/../../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path.display().to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::PathTraversal(format!(
            "empty path after normalization: {:?}",
            path
        )));
    }

    Ok(normalized)
}

/// Join a relative path under `root`
pub fn root_join(root: &Path, path: impl AsRef<Path>) -> Result<PathBuf> {
    Ok(root.join(sanitize_path(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_join_strips_leading_slash() {
        let joined = root_join(Path::new("/tmp/root"), "/var/lib/pkg").unwrap();
        assert_eq!(joined, PathBuf::from("/tmp/root/var/lib/pkg"));
    }

    #[test]
    fn test_root_join_live_root() {
        let joined = root_join(Path::new("/"), "bin/foo").unwrap();
        assert_eq!(joined, PathBuf::from("/bin/foo"));
    }

    #[test]
    fn test_sanitize_rejects_parent_and_empty() {
        assert!(matches!(sanitize_path("../etc"), Err(Error::PathTraversal(_))));
        assert!(sanitize_path("/").is_err());
        assert_eq!(sanitize_path("./a/./b").unwrap(), PathBuf::from("a/b"));
    }
}
