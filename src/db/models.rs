// src/db/models.rs

//! Data models for pkgport database entries
//!
//! A package record lives at `<db>/<name>/<version>` as a text file with
//! one root-relative path per line.

use crate::packages::PackageFile;
use std::fmt;

/// An installed package and the paths it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    /// Sorted ascending whenever the record takes part in conflict detection
    pub files: Vec<String>,
}

impl PackageRecord {
    /// Create a new record, sorting the file list
    pub fn new(name: impl Into<String>, version: impl Into<String>, mut files: Vec<String>) -> Self {
        files.sort();
        Self {
            name: name.into(),
            version: version.into(),
            files,
        }
    }

    /// Create a record from a package's entries, directories included
    pub fn from_package_files(name: &str, version: &str, files: &[PackageFile]) -> Self {
        Self::new(name, version, files.iter().map(|f| f.path.clone()).collect())
    }

    /// Identity check
    pub fn is(&self, name: &str, version: &str) -> bool {
        self.name == name && self.version == version
    }

    /// Binary search in the sorted file list
    pub fn owns(&self, path: &str) -> bool {
        self.files.binary_search_by(|f| f.as_str().cmp(path)).is_ok()
    }

    /// Drop the given paths from the file list, keeping it sorted
    ///
    /// `paths` must be sorted ascending.
    pub fn remove_files(&mut self, paths: &[String]) {
        let mut remove = paths.iter().peekable();
        self.files.retain(|file| {
            while let Some(next) = remove.peek() {
                if next.as_str() < file.as_str() {
                    remove.next();
                } else {
                    break;
                }
            }
            remove.peek().is_none_or(|next| next.as_str() != file.as_str())
        });
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Files a candidate package shares with one installed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub name: String,
    pub version: String,
    /// Sorted ascending
    pub paths: Vec<String>,
}

impl Conflict {
    /// Human-readable listing used in `FilesConflict` errors
    pub fn describe(conflicts: &[Conflict]) -> String {
        let mut description = String::new();
        for conflict in conflicts {
            description.push_str(&format!("\n{}/{}:\n", conflict.name, conflict.version));
            for path in &conflict.paths {
                description.push_str(&format!(" {}\n", path));
            }
        }
        description
    }
}

/// Name and version of an installed package
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackageSummary {
    pub name: String,
    pub version: String,
}
