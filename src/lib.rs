// src/lib.rs

//! pkgport: source package manager and ports build scheduler
//!
//! Two tools share this library:
//!
//! - `pkg` installs package directories under an install root with
//!   file-level conflict detection, a staged transaction log and rollback
//! - `port` evaluates shell recipes from a ports tree, resolves their
//!   dependency graph and fetches or builds what is out of date
//!
//! # Layout
//!
//! - The package database is a directory tree, `<db>/<name>/<version>`,
//!   each file listing the paths the package owns
//! - Installs stage every file next to its destination and commit with
//!   renames; a failed commit restores what was there before
//! - Recipes run in a long-lived `/bin/sh`; scheduling is a fixed point
//!   over per-port status flags

pub mod cli;
pub mod config;
pub mod confirm;
pub mod console;
pub mod db;
mod error;
pub mod filesystem;
pub mod interrupt;
pub mod packages;
pub mod ports;
pub mod shell;
pub mod transaction;

pub use error::{Error, Result};
