// src/transaction/mod.rs

//! Filesystem transaction log
//!
//! An install is prepared by staging every new file next to its
//! destination and queueing one `FsTransaction` per file. Nothing visible
//! changes until `commit`, which applies the queued renames in order:
//!
//! ```text
//! destination -> backup      (only when the destination exists and a backup path is set)
//! staging     -> destination
//! ```
//!
//! Backups are deleted once every rename has succeeded. If any rename
//! fails, the log rolls back before returning the error. Each entry
//! remembers how far it got, so rollback undoes exactly the applied
//! prefix and discards the staged remainder.
//!
//! Rollback walks the log in the same order as commit. Entries never share
//! a destination, so the order does not change the outcome.
//!
//! A destination that existed before commit is never removed by rollback.
//! Without a backup path its previous content cannot be restored, so
//! entries that may overwrite something worth keeping must set one.

use crate::error::{IoContext, Result};
use crate::filesystem::{entry_exists, remove_entry, remove_if_exists};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Progress of a single queued move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Staged file written, destination untouched
    Staged,
    /// Previous destination moved to the backup path
    BackedUp,
    /// Staged file now at the destination; `replaced` is set when an
    /// existing destination was overwritten without a backup
    Applied { backed_up: bool, replaced: bool },
}

/// One pending atomic move
#[derive(Debug, Clone)]
pub struct FsTransaction {
    pub staging: PathBuf,
    pub destination: PathBuf,
    pub backup: Option<PathBuf>,
    state: TransactionState,
}

impl FsTransaction {
    pub fn new(staging: PathBuf, destination: PathBuf, backup: Option<PathBuf>) -> Self {
        Self {
            staging,
            destination,
            backup,
            state: TransactionState::Staged,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn apply(&mut self) -> Result<()> {
        let existed = entry_exists(&self.destination);
        if let Some(backup) = &self.backup
            && existed
        {
            debug!("Renaming {} -> {}", self.destination.display(), backup.display());
            fs::rename(&self.destination, backup).at_path(&self.destination)?;
            self.state = TransactionState::BackedUp;
        }

        debug!("Renaming {} -> {}", self.staging.display(), self.destination.display());
        fs::rename(&self.staging, &self.destination).at_path(&self.staging)?;
        let backed_up = self.state == TransactionState::BackedUp;
        self.state = TransactionState::Applied {
            backed_up,
            replaced: existed && !backed_up,
        };
        Ok(())
    }

    fn undo(&mut self) {
        match self.state {
            TransactionState::Staged => {}
            TransactionState::BackedUp | TransactionState::Applied { backed_up: true, .. } => {
                if let Some(backup) = &self.backup {
                    debug!("Renaming {} -> {}", backup.display(), self.destination.display());
                    if let Err(e) = fs::rename(backup, &self.destination) {
                        warn!(
                            "rename: {} -> {}: {}",
                            backup.display(),
                            self.destination.display(),
                            e
                        );
                    }
                }
            }
            TransactionState::Applied {
                backed_up: false,
                replaced: true,
            } => {
                warn!(
                    "{} was overwritten without backup and cannot be restored",
                    self.destination.display()
                );
            }
            TransactionState::Applied {
                backed_up: false,
                replaced: false,
            } => {
                debug!("Removing {}", self.destination.display());
                if let Err(e) = remove_if_exists(&self.destination) {
                    warn!("remove: {}", e);
                }
            }
        }

        debug!("Removing {}", self.staging.display());
        if let Err(e) = remove_if_exists(&self.staging) {
            warn!("remove: {}", e);
        }
        self.state = TransactionState::Staged;
    }
}

/// Ordered, append-only list of staged moves
///
/// The log is consumed by `commit` or `rollback`. Dropping an
/// uncommitted log leaves staged files behind; callers always end with
/// one of the two.
#[derive(Debug, Default)]
pub struct TransactionLog {
    transactions: Vec<FsTransaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a staged move
    pub fn push(&mut self, transaction: FsTransaction) {
        self.transactions.push(transaction);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transactions(&self) -> &[FsTransaction] {
        &self.transactions
    }

    /// Apply every move in order, rolling back on the first failure
    pub fn commit(mut self) -> Result<()> {
        for index in 0..self.transactions.len() {
            if let Err(e) = self.transactions[index].apply() {
                warn!("Transaction failed, rolling back: {}", e);
                self.rollback();
                return Err(e);
            }
        }

        for transaction in &self.transactions {
            if let TransactionState::Applied { backed_up: true, .. } = transaction.state
                && let Some(backup) = &transaction.backup
            {
                debug!("Removing {}", backup.display());
                if let Err(e) = remove_entry(backup) {
                    warn!("remove: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Undo whatever has been applied and discard staged files
    pub fn rollback(mut self) {
        for transaction in &mut self.transactions {
            transaction.undo();
        }
    }
}
