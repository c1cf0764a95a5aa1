// src/ports/targets.rs

//! Persisted list of requested ports
//!
//! `<ports>/targets` holds one port path per line. Saving writes
//! `targets.new` and renames it over the old file.

use crate::error::{Error, IoContext, Result};
use crate::filesystem::{read_lines, write_lines};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Targets {
    path: PathBuf,
    entries: Vec<String>,
}

impl Targets {
    /// Read the targets file; a missing file means no targets
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match read_lines(&path) {
            Ok(entries) => entries,
            Err(Error::PathIo { source, .. }) if source.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Append unless already present
    pub fn add(&mut self, target: &str) -> bool {
        if self.entries.iter().any(|t| t == target) {
            return false;
        }
        self.entries.push(target.to_string());
        true
    }

    /// Remove every occurrence; returns how many were removed
    pub fn delete(&mut self, target: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|t| t != target);
        before - self.entries.len()
    }

    pub fn save(&self) -> Result<()> {
        let mut new_name = OsString::from(self.path.as_os_str());
        new_name.push(".new");
        let new_path = PathBuf::from(new_name);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).at_path(parent)?;
        }
        write_lines(&self.entries, &new_path)?;
        fs::rename(&new_path, &self.path).at_path(&new_path)?;
        debug!("Saved {} targets to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let targets = Targets::load(temp_dir.path().join("targets")).unwrap();
        assert!(targets.entries().is_empty());
    }

    #[test]
    fn test_add_delete_save() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("targets");

        let mut targets = Targets::load(&path).unwrap();
        assert!(targets.add("base/foo"));
        assert!(targets.add("base/bar"));
        assert!(!targets.add("base/foo"));
        targets.save().unwrap();

        let mut reloaded = Targets::load(&path).unwrap();
        assert_eq!(reloaded.entries(), &["base/foo", "base/bar"]);
        assert_eq!(reloaded.delete("base/foo"), 1);
        assert_eq!(reloaded.delete("base/none"), 0);
        reloaded.save().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "base/bar\n");
        assert!(!temp_dir.path().join("targets.new").exists());
    }
}
