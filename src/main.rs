// src/main.rs

use anyhow::{Context, Result};
use pkgport::cli::{PkgCli, PkgCommand};
use pkgport::confirm::{AssumeYes, Confirm, TerminalConfirm};
use pkgport::console;
use pkgport::db::{InstallFlags, PackageDatabase};
use pkgport::interrupt::Interrupt;
use tracing::{info, warn};

/// `foo/1.0` and `foo 1.0` name the same package; the slash form wins
/// when both are given
fn split_package_arg(package: &str, version: Option<String>) -> (String, Option<String>) {
    match package.split_once('/') {
        Some((name, slash_version)) => {
            if let Some(ignored) = &version {
                warn!("Ignoring version {} in favour of {}", ignored, package);
            }
            (name.to_string(), Some(slash_version.to_string()))
        }
        None => (package.to_string(), version),
    }
}

fn main() -> Result<()> {
    let cli: PkgCli = console::parse_args();
    console::init_tracing(cli.trace);

    let interrupt = Interrupt::new();
    console::install_interrupt_handlers(&interrupt)?;

    let confirm: Box<dyn Confirm> = if cli.interactive {
        Box::new(TerminalConfirm)
    } else {
        Box::new(AssumeYes)
    };

    let mut db = PackageDatabase::new(&cli.root, &cli.db_path)?.with_interrupt(interrupt);

    match cli.command {
        PkgCommand::Install { path } => {
            let flags = InstallFlags {
                upgrade: false,
                force: cli.force,
            };
            let report = db
                .install(&path, flags, confirm.as_ref())
                .with_context(|| format!("Failed to install {}", path.display()))?;
            info!("Installed {}/{} ({} files)", report.name, report.version, report.files);
        }
        PkgCommand::Upgrade { path } => {
            let flags = InstallFlags {
                upgrade: true,
                force: cli.force,
            };
            let report = db
                .install(&path, flags, confirm.as_ref())
                .with_context(|| format!("Failed to upgrade from {}", path.display()))?;
            info!("Installed {}/{} ({} files)", report.name, report.version, report.files);
            for version in &report.removed_versions {
                info!("Removed {}/{}", report.name, version);
            }
        }
        PkgCommand::Drop { package, version } => {
            let (name, version) = split_package_arg(&package, version);
            let dropped = db
                .drop_packages(&name, version.as_deref())
                .with_context(|| format!("Failed to drop {}", package))?;
            if dropped.is_empty() {
                warn!("Package {} is not installed", package);
            }
            for summary in dropped {
                info!("Dropped {}/{}", summary.name, summary.version);
            }
        }
        PkgCommand::List => {
            for summary in db.list()? {
                println!("{}/{}", summary.name, summary.version);
            }
        }
    }
    Ok(())
}
