// src/packages/traits.rs

//! Common traits for package sources

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Type of a package entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
}

/// A file inside a package, named relative to the install root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub path: String,
    pub kind: FileKind,
}

impl PackageFile {
    pub fn new(path: impl Into<String>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// Common interface for installable package sources
pub trait PackageFormat {
    /// Load a package from the given path
    fn parse(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Get the package name
    fn name(&self) -> &str;

    /// Get the package version
    fn version(&self) -> &str;

    /// Files sorted ascending by path, directories included
    fn files(&self) -> &[PackageFile];

    /// Location of a package entry's content on disk
    fn source_path(&self, file: &PackageFile) -> PathBuf;

    /// Directory hooks run from after the install
    fn base_path(&self) -> &Path;
}
