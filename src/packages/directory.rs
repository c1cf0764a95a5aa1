// src/packages/directory.rs

//! Directory package format
//!
//! ```text
//! pkg/
//!   .name          foo
//!   .version       1.0-1-x86_64
//!   bin/foo
//!   share/doc
//! ```
//!
//! Top-level dot entries are metadata and never part of the file list.
//! Deeper dot files are regular package content.

use crate::config::{PACKAGE_NAME_FILE, PACKAGE_VERSION_FILE};
use crate::error::{Error, Result};
use crate::filesystem::read_first_line;
use crate::packages::traits::{FileKind, PackageFile, PackageFormat};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Package stored as an unpacked directory tree
#[derive(Debug, Clone)]
pub struct DirectoryPackage {
    path: PathBuf,
    name: String,
    version: String,
    files: Vec<PackageFile>,
}

impl DirectoryPackage {
    fn walk(root: &Path) -> Result<Vec<PackageFile>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() != 1 || !entry.file_name().to_string_lossy().starts_with('.')
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::at(path, io::Error::from(e))
            })?;

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::InvalidPackage(entry.path().display().to_string()))?;
            let relative = relative.to_str().ok_or_else(|| {
                Error::InvalidPackage(format!("non UTF-8 path: {}", relative.display()))
            })?;

            let file_type = entry.file_type();
            let kind = if file_type.is_symlink() {
                FileKind::Symlink
            } else if file_type.is_dir() {
                FileKind::Directory
            } else {
                FileKind::Regular
            };

            files.push(PackageFile::new(relative, kind));
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

impl PackageFormat for DirectoryPackage {
    fn parse(path: &Path) -> Result<Self> {
        debug!("Loading package directory: {}", path.display());

        if !path.is_dir() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }

        let name = read_first_line(&path.join(PACKAGE_NAME_FILE))?;
        let version = read_first_line(&path.join(PACKAGE_VERSION_FILE))?;
        if name.is_empty() || version.is_empty() || name.contains('/') || version.contains('/') {
            return Err(Error::InvalidPackage(format!(
                "bad name/version '{}'/'{}' in {}",
                name,
                version,
                path.display()
            )));
        }

        let files = Self::walk(path)?;

        debug!("Loaded package {}/{} with {} entries", name, version, files.len());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            version,
            files,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn files(&self) -> &[PackageFile] {
        &self.files
    }

    fn source_path(&self, file: &PackageFile) -> PathBuf {
        self.path.join(&file.path)
    }

    fn base_path(&self) -> &Path {
        &self.path
    }
}
