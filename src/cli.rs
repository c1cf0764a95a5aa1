// src/cli.rs

//! Command-line definitions for `pkg` and `port`
//!
//! `build.rs` compiles this file as well to render man pages, so it only
//! uses clap and `config`.

use crate::config::{DEFAULT_BUILD_USER, DEFAULT_DB_PATH, DEFAULT_PORTS_PATH};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pkg")]
#[command(author, version, about = "Install, upgrade and drop packages under an install root", long_about = None)]
pub struct PkgCli {
    /// Install root
    #[arg(short, long, default_value = "/")]
    pub root: PathBuf,

    /// Package database, relative to the install root
    #[arg(short = 'd', long = "db-path", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Ask before each filesystem transaction
    #[arg(short, long)]
    pub interactive: bool,

    /// Debug logging
    #[arg(short, long)]
    pub trace: bool,

    /// Install over conflicting files and already-installed versions
    #[arg(short, long)]
    pub force: bool,

    #[command(subcommand)]
    pub command: PkgCommand,
}

#[derive(Subcommand, Debug)]
pub enum PkgCommand {
    /// Install a package directory
    Install {
        /// Directory containing `.name`, `.version` and the file tree
        path: PathBuf,
    },
    /// Install a package directory and remove other versions of it
    Upgrade {
        path: PathBuf,
    },
    /// Remove installed versions of a package
    Drop {
        /// `name` or `name/version`
        package: String,
        /// Version to drop (all versions if omitted)
        version: Option<String>,
    },
    /// List installed packages
    List,
}

#[derive(Parser, Debug)]
#[command(name = "port")]
#[command(author, version, about = "Build and upgrade packages from the ports tree", long_about = None)]
pub struct PortCli {
    /// Install root
    #[arg(short, long, default_value = "/")]
    pub root: PathBuf,

    /// Ports tree
    #[arg(short = 'p', long = "ports-path", default_value = DEFAULT_PORTS_PATH)]
    pub ports_path: PathBuf,

    /// Package database, relative to the install root
    #[arg(short = 'd', long = "db-path", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// User that runs build scripts when started as root
    #[arg(short = 'u', long = "build-user", default_value = DEFAULT_BUILD_USER)]
    pub build_user: String,

    /// Ask before running scripts and installing packages
    #[arg(short, long)]
    pub interactive: bool,

    /// Debug logging
    #[arg(short, long)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: PortCommand,
}

#[derive(Subcommand, Debug)]
pub enum PortCommand {
    /// Show loaded ports and their dependencies
    Depends {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Fetch or build what is out of date
    Upgrade {
        /// Ports to process (every loaded port if omitted)
        targets: Vec<String>,
    },
    /// Add ports to the targets file
    Add {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Remove ports from the targets file
    Delete {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Print the targets file
    Targets,
}
