// src/db/lock.rs

//! Reentrant directory lock for the package database
//!
//! The lock is the existence of `<db>/.LOCK`. `mkdir` is atomic, so only
//! one holder can create it. The holder counts nested acquisitions and
//! removes the directory when the count returns to zero or when the lock
//! is dropped. Ownership is tied to the acquiring process id, so a forked
//! child never releases its parent's lock.

use crate::error::{Error, IoContext, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory-based advisory lock with a nesting counter
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    owner_pid: Option<u32>,
    depth: usize,
}

impl DirLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner_pid: None,
            depth: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Nesting depth held by this process
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_held(&self) -> bool {
        self.depth > 0 && self.owner_pid == Some(std::process::id())
    }

    /// Acquire, or nest if already held
    pub fn acquire(&mut self) -> Result<()> {
        let pid = std::process::id();
        if self.owner_pid.is_none() {
            self.owner_pid = Some(pid);
        }

        if self.depth == 0 {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).at_path(parent)?;
            }
            match fs::create_dir(&self.path) {
                Ok(()) => debug!("Acquired database lock {}", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(Error::DbAlreadyLocked(self.path.clone()));
                }
                Err(e) => return Err(Error::at(&self.path, e)),
            }
            self.owner_pid = Some(pid);
        }

        self.depth += 1;
        Ok(())
    }

    /// Leave one nesting level, removing the directory at zero
    pub fn release(&mut self) {
        if self.owner_pid != Some(std::process::id()) || self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.remove_dir();
        }
    }

    fn remove_dir(&self) {
        match fs::remove_dir(&self.path) {
            Ok(()) => debug!("Released database lock {}", self.path.display()),
            Err(e) => warn!("rmdir: {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if self.is_held() {
            self.depth = 0;
            self.remove_dir();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_acquire() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("db/.LOCK");

        let mut lock = DirLock::new(&path);
        lock.acquire().unwrap();
        lock.acquire().unwrap();
        assert_eq!(lock.depth(), 2);

        lock.release();
        assert!(path.is_dir());
        lock.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_second_holder_rejected_until_release() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".LOCK");

        let mut first = DirLock::new(&path);
        let mut second = DirLock::new(&path);
        first.acquire().unwrap();

        assert!(matches!(second.acquire(), Err(Error::DbAlreadyLocked(_))));
        assert_eq!(second.depth(), 0);

        first.release();
        second.acquire().unwrap();
        assert!(second.is_held());
    }

    #[test]
    fn test_drop_releases() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".LOCK");
        {
            let mut lock = DirLock::new(&path);
            lock.acquire().unwrap();
            lock.acquire().unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_release_without_acquire_is_noop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".LOCK");
        fs::create_dir(&path).unwrap();

        let mut lock = DirLock::new(&path);
        lock.release();
        drop(lock);
        assert!(path.exists());
    }
}
