// src/packages/mod.rs

//! Package sources for pkgport
//!
//! A package is a directory holding `.name` and `.version` sentinel files
//! next to a file tree that mirrors the install root. Formats implement
//! the `PackageFormat` trait.

pub mod directory;
pub mod traits;

pub use directory::DirectoryPackage;
pub use traits::{FileKind, PackageFile, PackageFormat};
