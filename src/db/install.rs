// src/db/install.rs

//! Package installation
//!
//! Install order:
//!
//! 1. Load the package and take the database lock
//! 2. Refuse an already-installed name/version unless forced
//! 3. Check file/directory type agreement with what is on disk
//! 4. Detect conflicts; strip tolerated ones from their owners' records
//! 5. Stage files next to their destinations and stage the new record
//! 6. Confirm, then commit the transaction log (rolled back on failure)
//! 7. Run post-install hooks
//! 8. On upgrade, drop other installed versions of the same package

use super::hooks::run_post_install_hooks;
use super::{Conflict, PackageDatabase, PackageRecord};
use crate::config::{BACKUP_SUFFIX, STAGING_SUFFIX};
use crate::confirm::Confirm;
use crate::error::{Error, IoContext, Result};
use crate::filesystem::{remove_if_exists, root_join};
use crate::packages::{DirectoryPackage, FileKind, PackageFormat};
use crate::transaction::{FsTransaction, TransactionLog};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Install behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallFlags {
    /// Tolerate conflicts with older versions of the same package and
    /// remove those versions afterwards
    pub upgrade: bool,
    /// Tolerate every conflict and reinstalls
    pub force: bool,
}

impl InstallFlags {
    pub const NONE: Self = Self {
        upgrade: false,
        force: false,
    };
    pub const UPGRADE: Self = Self {
        upgrade: true,
        force: false,
    };
    pub const FORCE: Self = Self {
        upgrade: false,
        force: true,
    };
}

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub files: usize,
    /// Versions of the same package removed by an upgrade
    pub removed_versions: Vec<String>,
}

impl PackageDatabase {
    /// Install the package directory at `package_path`
    pub fn install(&mut self, package_path: &Path, flags: InstallFlags, confirm: &dyn Confirm) -> Result<InstallReport> {
        let package = DirectoryPackage::parse(package_path)?;
        self.install_package(&package, flags, confirm)
    }

    /// Install an already-loaded package under the database lock
    pub fn install_package(
        &mut self,
        package: &dyn PackageFormat,
        flags: InstallFlags,
        confirm: &dyn Confirm,
    ) -> Result<InstallReport> {
        self.lock()?;
        let result = self.install_locked(package, flags, confirm);
        self.unlock();
        result
    }

    fn install_locked(
        &mut self,
        package: &dyn PackageFormat,
        flags: InstallFlags,
        confirm: &dyn Confirm,
    ) -> Result<InstallReport> {
        let name = package.name();
        let version = package.version();
        info!("Installing {}/{}", name, version);

        if self.is_installed(name, version)? {
            if !flags.force {
                return Err(Error::AlreadyInstalled {
                    name: name.to_string(),
                    version: version.to_string(),
                });
            }
            info!("Reinstalling {}/{}", name, version);
        }

        self.load(true)?;
        // A forced reinstall replaces the record wholesale
        self.records.retain(|r| !r.is(name, version));

        self.check_file_types(package)?;

        info!("Searching conflicts");
        let conflicts = self.find_conflicts(package.files());
        if !conflicts.is_empty() {
            let self_upgrade = flags.upgrade && conflicts.iter().all(|c| c.name == name);
            if !flags.force && !self_upgrade {
                return Err(Error::FilesConflict {
                    message: "Conflict with other packages".to_string(),
                    context: Conflict::describe(&conflicts),
                });
            }
            info!("Cleaning conflicts");
            self.remove_conflicts(&conflicts)?;
        }

        self.interrupt.check("install")?;

        info!("Preparing transaction");
        let record = PackageRecord::from_package_files(name, version, package.files());
        let mut log = TransactionLog::new();
        let prepared = self
            .stage_files(package, &mut log)
            .and_then(|()| self.write_record(&record, &mut log))
            .and_then(|()| self.interrupt.check("install"))
            .and_then(|()| confirm.confirm(&format!("Process fs transaction for {}/{}?", name, version)));
        match prepared {
            Ok(true) => {}
            Ok(false) => {
                log.rollback();
                return Err(Error::AbortedByUser);
            }
            Err(e) => {
                log.rollback();
                return Err(e);
            }
        }
        log.commit()?;

        let position = self
            .records
            .partition_point(|r| (&r.name, &r.version) < (&record.name, &record.version));
        self.records.insert(position, record);

        run_post_install_hooks(&self.root, package.base_path())?;

        let removed_versions = if flags.upgrade {
            self.drop_other_versions(name, version, confirm)?
        } else {
            Vec::new()
        };

        Ok(InstallReport {
            name: name.to_string(),
            version: version.to_string(),
            files: package.files().len(),
            removed_versions,
        })
    }

    /// Existing entries must agree with the candidate on being a directory
    fn check_file_types(&self, package: &dyn PackageFormat) -> Result<()> {
        for file in package.files() {
            let destination = root_join(&self.root, &file.path)?;
            let existing = match fs::symlink_metadata(&destination) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::at(&destination, e)),
            };
            if existing.is_dir() != file.is_directory() {
                return Err(Error::FilesConflict {
                    message: "file/directory mismatch".to_string(),
                    context: destination.display().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Rewrite conflicting records without the contested paths
    fn remove_conflicts(&mut self, conflicts: &[Conflict]) -> Result<()> {
        let mut log = TransactionLog::new();
        for conflict in conflicts {
            let Some(record) = self
                .records
                .iter_mut()
                .find(|r| r.is(&conflict.name, &conflict.version))
            else {
                continue;
            };
            record.remove_files(&conflict.paths);
            debug!("Package info will be updated for {}", record);

            let record = record.clone();
            if let Err(e) = self.write_record(&record, &mut log) {
                log.rollback();
                return Err(e);
            }
        }
        log.commit()
    }

    /// Stage every non-directory entry; create directories right away
    fn stage_files(&self, package: &dyn PackageFormat, log: &mut TransactionLog) -> Result<()> {
        for file in package.files() {
            let destination = root_join(&self.root, &file.path)?;
            let source = package.source_path(file);

            if file.kind == FileKind::Directory {
                fs::create_dir_all(&destination).at_path(&destination)?;
                continue;
            }

            let staging = with_suffix(&destination, STAGING_SUFFIX);
            let backup = with_suffix(&destination, BACKUP_SUFFIX);
            log.push(FsTransaction::new(staging.clone(), destination, Some(backup)));

            remove_if_exists(&staging)?;
            if file.kind == FileKind::Symlink {
                let target = fs::read_link(&source).at_path(&source)?;
                symlink(&target, &staging).at_path(&staging)?;
            } else {
                copy_regular_file(&source, &staging)?;
            }
        }
        Ok(())
    }

    /// Remove other versions of `name` after an upgrade, asking first
    fn drop_other_versions(&mut self, name: &str, version: &str, confirm: &dyn Confirm) -> Result<Vec<String>> {
        let old_versions: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.name == name && r.version != version)
            .map(|r| r.version.clone())
            .collect();

        let mut removed = Vec::new();
        for old_version in old_versions {
            if !confirm.confirm(&format!("Remove package {}/{}?", name, old_version))? {
                continue;
            }
            info!("Removing old version {}/{}", name, old_version);
            self.drop_record(name, &old_version)?;
            removed.push(old_version);
        }
        Ok(removed)
    }
}

/// Copy contents and the permission bits (without setuid/setgid/sticky)
fn copy_regular_file(source: &Path, destination: &Path) -> Result<()> {
    let mode = fs::symlink_metadata(source).at_path(source)?.permissions().mode() & 0o777;
    let mut reader = File::open(source).at_path(source)?;
    let mut writer = File::create(destination).at_path(destination)?;
    io::copy(&mut reader, &mut writer).at_path(destination)?;
    fs::set_permissions(destination, fs::Permissions::from_mode(mode)).at_path(destination)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AssumeYes;

    struct Decline;

    impl Confirm for Decline {
        fn confirm(&self, _question: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn make_package(dir: &Path, name: &str, version: &str, files: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(".name"), name).unwrap();
        fs::write(dir.join(".version"), version).unwrap();
        for file in files {
            let path = dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("{} {}", name, version)).unwrap();
        }
    }

    #[test]
    fn test_install_copies_files_and_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        let pkg = temp_dir.path().join("pkg");
        make_package(&pkg, "foo", "1.0", &["bin/foo"]);
        fs::set_permissions(pkg.join("bin/foo"), fs::Permissions::from_mode(0o755)).unwrap();
        symlink("foo", pkg.join("bin/foo-alias")).unwrap();

        let mut db = PackageDatabase::new(&root, Path::new("db")).unwrap();
        let report = db.install(&pkg, InstallFlags::NONE, &AssumeYes).unwrap();

        assert_eq!(report.files, 3);
        let mode = fs::metadata(root.join("bin/foo")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_link(root.join("bin/foo-alias")).unwrap(), PathBuf::from("foo"));
        assert!(!root.join("bin/foo.pkg.transaction.new").exists());
        assert!(!db.is_locked());
        assert!(!db.path().join(".LOCK").exists());
    }

    #[test]
    fn test_install_twice_is_already_installed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        let pkg = temp_dir.path().join("pkg");
        make_package(&pkg, "foo", "1.0", &["bin/foo"]);

        let mut db = PackageDatabase::new(&root, Path::new("db")).unwrap();
        db.install(&pkg, InstallFlags::NONE, &AssumeYes).unwrap();
        let result = db.install(&pkg, InstallFlags::NONE, &AssumeYes);
        assert!(matches!(result, Err(Error::AlreadyInstalled { .. })));

        db.install(&pkg, InstallFlags::FORCE, &AssumeYes).unwrap();
        db.load(true).unwrap();
        assert_eq!(db.records().len(), 1);
    }

    #[test]
    fn test_file_directory_mismatch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        let pkg = temp_dir.path().join("pkg");
        make_package(&pkg, "foo", "1.0", &["bin/foo"]);
        fs::create_dir_all(root.join("bin/foo")).unwrap();

        let mut db = PackageDatabase::new(&root, Path::new("db")).unwrap();
        let result = db.install(&pkg, InstallFlags::NONE, &AssumeYes);
        assert!(matches!(result, Err(Error::FilesConflict { message, .. }) if message == "file/directory mismatch"));
    }

    #[test]
    fn test_declined_install_leaves_no_trace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        let pkg = temp_dir.path().join("pkg");
        make_package(&pkg, "foo", "1.0", &["bin/foo"]);

        let mut db = PackageDatabase::new(&root, Path::new("db")).unwrap();
        let result = db.install(&pkg, InstallFlags::NONE, &Decline);

        assert!(matches!(result, Err(Error::AbortedByUser)));
        assert!(!root.join("bin/foo").exists());
        assert!(!root.join("bin/foo.pkg.transaction.new").exists());
        assert!(!db.is_installed("foo", "1.0").unwrap());
        assert!(!db.path().join("foo/.1.0.tmp").exists());
    }

    #[test]
    fn test_force_strips_paths_from_previous_owner() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        let foo = temp_dir.path().join("foo");
        let bar = temp_dir.path().join("bar");
        make_package(&foo, "foo", "1.0", &["bin/foo"]);
        make_package(&bar, "bar", "1.0", &["bin/foo"]);

        let mut db = PackageDatabase::new(&root, Path::new("db")).unwrap();
        db.install(&foo, InstallFlags::NONE, &AssumeYes).unwrap();
        db.install(&bar, InstallFlags::FORCE, &AssumeYes).unwrap();

        db.load(true).unwrap();
        assert!(!db.find_record("foo", "1.0").unwrap().owns("bin/foo"));
        assert!(db.find_record("bar", "1.0").unwrap().owns("bin/foo"));
        assert_eq!(fs::read_to_string(root.join("bin/foo")).unwrap(), "bar 1.0");
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("/r/bin/foo"), STAGING_SUFFIX),
            PathBuf::from("/r/bin/foo.pkg.transaction.new")
        );
    }
}
