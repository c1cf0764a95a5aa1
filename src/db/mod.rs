// src/db/mod.rs

//! Package database for pkgport
//!
//! The database is a directory tree under the install root:
//!
//! ```text
//! <root>/<db>/.LOCK             advisory lock (directory)
//! <root>/<db>/<name>/<version>  one root-relative path per line
//! ```
//!
//! This module handles:
//! - Locking (reentrant, directory based)
//! - Loading records, with or without their file lists
//! - Sorted-merge conflict detection against a candidate package
//! - Staging record writes into a transaction log
//! - Dropping packages with cross-package ownership checks

mod hooks;
mod install;
mod lock;
pub mod models;

pub use hooks::run_post_install_hooks;
pub use install::{InstallFlags, InstallReport};
pub use lock::DirLock;
pub use models::{Conflict, PackageRecord, PackageSummary};

use crate::config::LOCK_DIR_NAME;
use crate::error::{Error, IoContext, Result};
use crate::filesystem::{read_lines, remove_entry, root_join, write_lines};
use crate::interrupt::Interrupt;
use crate::packages::PackageFile;
use crate::transaction::{FsTransaction, TransactionLog};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Handle on one on-disk package database
///
/// Records are owned by the handle and only reflect the disk after
/// `load`. The lock, if held, is released when the handle is dropped.
#[derive(Debug)]
pub struct PackageDatabase {
    root: PathBuf,
    path: PathBuf,
    lock: DirLock,
    records: Vec<PackageRecord>,
    files_loaded: bool,
    interrupt: Interrupt,
}

impl PackageDatabase {
    /// Open the database at `<root>/<db_path>`
    ///
    /// Nothing is read or created until `lock` or `load`.
    pub fn new(root: &Path, db_path: &Path) -> Result<Self> {
        let path = root_join(root, db_path)?;
        let lock = DirLock::new(path.join(LOCK_DIR_NAME));
        Ok(Self {
            root: root.to_path_buf(),
            path,
            lock,
            records: Vec::new(),
            files_loaded: false,
            interrupt: Interrupt::default(),
        })
    }

    /// Poll this token at checkpoints
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    pub fn find_record(&self, name: &str, version: &str) -> Option<&PackageRecord> {
        self.records.iter().find(|r| r.is(name, version))
    }

    /// Acquire the database lock, nesting if already held
    pub fn lock(&mut self) -> Result<()> {
        fs::create_dir_all(&self.path).at_path(&self.path)?;
        self.lock.acquire()
    }

    /// Leave one lock level
    pub fn unlock(&mut self) {
        self.lock.release();
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    /// Replace the in-memory records with what is on disk
    ///
    /// Dot entries are skipped at both levels: the lock directory and
    /// staged `.version.tmp` files never show up as records. A database
    /// directory that does not exist yet is empty.
    pub fn load(&mut self, include_files: bool) -> Result<()> {
        let mut records = Vec::new();

        let names = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.records = records;
                self.files_loaded = include_files;
                return Ok(());
            }
            Err(e) => return Err(Error::at(&self.path, e)),
        };

        for name_entry in names {
            let name_entry = name_entry.at_path(&self.path)?;
            let Some(name) = visible_name(&name_entry.file_name()) else {
                continue;
            };
            let name_path = name_entry.path();
            if !name_entry.file_type().at_path(&name_path)?.is_dir() {
                warn!("Ignoring stray file in package database: {}", name_path.display());
                continue;
            }

            for version_entry in fs::read_dir(&name_path).at_path(&name_path)? {
                let version_entry = version_entry.at_path(&name_path)?;
                let Some(version) = visible_name(&version_entry.file_name()) else {
                    continue;
                };
                let files = if include_files {
                    read_lines(&version_entry.path())?
                } else {
                    Vec::new()
                };
                records.push(PackageRecord::new(name.clone(), version, files));
            }
        }

        records.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        debug!("Loaded {} package records from {}", records.len(), self.path.display());

        self.records = records;
        self.files_loaded = include_files;
        Ok(())
    }

    /// Names and versions of every installed package
    pub fn list(&mut self) -> Result<Vec<PackageSummary>> {
        self.load(false)?;
        Ok(self
            .records
            .iter()
            .map(|r| PackageSummary {
                name: r.name.clone(),
                version: r.version.clone(),
            })
            .collect())
    }

    /// Whether `<db>/<name>/<version>` exists
    pub fn is_installed(&self, name: &str, version: &str) -> Result<bool> {
        let path = self.record_path(name, version)?;
        match fs::symlink_metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::at(&path, e)),
        }
    }

    /// Paths each loaded record shares with the candidate
    ///
    /// `candidate` must be sorted by path, and so must every record's
    /// files. Directory entries of the candidate never conflict. Only
    /// records with at least one shared path are reported.
    pub fn find_conflicts(&self, candidate: &[PackageFile]) -> Vec<Conflict> {
        self.records
            .iter()
            .filter_map(|record| {
                let paths = merge_conflicts(candidate, &record.files);
                (!paths.is_empty()).then(|| Conflict {
                    name: record.name.clone(),
                    version: record.version.clone(),
                    paths,
                })
            })
            .collect()
    }

    /// Stage `record` as `<db>/<name>/<version>`
    ///
    /// The list is written to `<db>/<name>/.<version>.tmp` now and moved
    /// into place when `log` commits. An existing record is kept as
    /// `.<version>.backup` until then, so rollback restores it.
    pub fn write_record(&self, record: &PackageRecord, log: &mut TransactionLog) -> Result<()> {
        let destination = self.record_path(&record.name, &record.version)?;
        let dir = destination
            .parent()
            .ok_or_else(|| Error::PathNotFound(destination.clone()))?;
        fs::create_dir_all(dir).at_path(dir)?;

        let staging = dir.join(format!(".{}.tmp", record.version));
        let backup = dir.join(format!(".{}.backup", record.version));
        log.push(FsTransaction::new(staging.clone(), destination, Some(backup)));
        write_lines(&record.files, &staging)
    }

    /// Remove a package's files and its record
    ///
    /// Files are visited in reverse order so directory contents go before
    /// the directory. A path still claimed by any other loaded record is
    /// kept. Individual removal failures are logged and skipped.
    pub fn drop_record(&mut self, name: &str, version: &str) -> Result<()> {
        if !self.files_loaded {
            self.load(true)?;
        }
        let record_path = self.record_path(name, version)?;
        let index = self
            .records
            .iter()
            .position(|r| r.is(name, version))
            .ok_or_else(|| Error::PathNotFound(record_path.clone()))?;
        let record = self.records.remove(index);

        for file in record.files.iter().rev() {
            if let Some(owner) = self.records.iter().find(|other| other.owns(file)) {
                debug!("Keeping {} (owned by {})", file, owner);
                continue;
            }
            let path = match root_join(&self.root, file) {
                Ok(path) => path,
                Err(e) => {
                    warn!("{}: {}", record, e);
                    continue;
                }
            };
            debug!("Removing {}", path.display());
            if let Err(e) = remove_entry(&path) {
                warn!("remove: {}", e);
            }
        }

        debug!("Removing {}", record_path.display());
        if let Err(e) = remove_entry(&record_path) {
            warn!("remove: {}", e);
        }
        if let Some(name_dir) = record_path.parent() {
            // Only succeeds once the last version is gone
            let _ = fs::remove_dir(name_dir);
        }
        Ok(())
    }

    /// Drop every installed version of `name`, or just `version`
    pub fn drop_packages(&mut self, name: &str, version: Option<&str>) -> Result<Vec<PackageSummary>> {
        self.lock()?;
        let result = self.drop_packages_locked(name, version);
        self.unlock();
        result
    }

    fn drop_packages_locked(&mut self, name: &str, version: Option<&str>) -> Result<Vec<PackageSummary>> {
        self.load(true)?;

        let matches: Vec<PackageSummary> = self
            .records
            .iter()
            .filter(|r| r.name == name && version.is_none_or(|v| v == r.version))
            .map(|r| PackageSummary {
                name: r.name.clone(),
                version: r.version.clone(),
            })
            .collect();

        for summary in &matches {
            self.interrupt.check("drop")?;
            self.drop_record(&summary.name, &summary.version)?;
        }
        Ok(matches)
    }

    fn record_path(&self, name: &str, version: &str) -> Result<PathBuf> {
        if name.contains('/') || version.contains('/') {
            return Err(Error::PathTraversal(format!("{}/{}", name, version)));
        }
        root_join(&self.path, Path::new(name).join(version))
    }
}

/// Two-pointer merge of two ascending lists
///
/// Advances whichever side is behind; equal paths are collected and both
/// sides step forward. Directory entries on the candidate side are
/// skipped. Runs in O(candidate + installed).
fn merge_conflicts(candidate: &[PackageFile], installed: &[String]) -> Vec<String> {
    let mut conflicts = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < candidate.len() && j < installed.len() {
        let file = &candidate[i];
        if file.is_directory() {
            i += 1;
            continue;
        }
        match file.path.as_str().cmp(installed[j].as_str()) {
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Equal => {
                conflicts.push(installed[j].clone());
                i += 1;
                j += 1;
            }
        }
    }
    conflicts
}

fn visible_name(name: &std::ffi::OsStr) -> Option<String> {
    let name = name.to_str()?;
    (!name.starts_with('.')).then(|| name.to_string())
}
