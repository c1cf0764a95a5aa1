// src/ports/runner.rs

//! Build steps for a single port
//!
//! Each step gets a private `bld.*` directory under `<ports>/tmp`, owned
//! by the build user, holding a generated `script.sh` that sources the
//! shared `build_template.sh` with the step name as its argument. A
//! successful step leaves a package directory at `<tmp>/fr`, which is
//! then installed. The directory is removed when the step returns.

use super::{PortGraph, recipe};
use crate::confirm::Confirm;
use crate::db::InstallFlags;
use crate::error::{Error, IoContext, Result};
use crate::interrupt::Interrupt;
use nix::unistd::{Gid, Uid, User, chown, geteuid};
use std::fmt;
use std::fs;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Directory inside the step's temp dir where a package is produced
const PRODUCED_PACKAGE_DIR: &str = "fr";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    /// Download a prebuilt package
    Fetch,
    /// Build from source
    Build,
}

impl BuildStep {
    /// Argument passed to the build template
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStep::Fetch => "get_package",
            BuildStep::Build => "build_package",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs one step for one port
///
/// `Ok(true)` means the step completed and its package was installed.
/// `Ok(false)` is an ordinary failure the scheduler records on the port.
pub trait BuildRunner {
    fn run_step(&mut self, graph: &PortGraph, index: usize, step: BuildStep) -> Result<bool>;
}

/// Unprivileged account builds run as
#[derive(Debug, Clone)]
pub struct BuildUser {
    pub name: String,
    pub uid: Uid,
    pub gid: Gid,
}

impl BuildUser {
    pub fn resolve(name: &str) -> Result<Self> {
        let user = User::from_name(name)?.ok_or_else(|| Error::UnknownUser(name.to_string()))?;
        Ok(Self {
            name: user.name,
            uid: user.uid,
            gid: user.gid,
        })
    }
}

/// Runs the build template through `/bin/sh` and installs the result
pub struct PortBuildRunner<'a> {
    user: Option<BuildUser>,
    confirm: &'a dyn Confirm,
    interrupt: Interrupt,
}

impl<'a> PortBuildRunner<'a> {
    /// Privileges are only dropped when running as root
    pub fn new(build_user: &str, confirm: &'a dyn Confirm, interrupt: Interrupt) -> Result<Self> {
        let user = if geteuid().is_root() {
            Some(BuildUser::resolve(build_user)?)
        } else {
            debug!("Not running as root, building as the current user");
            None
        };
        Ok(Self {
            user,
            confirm,
            interrupt,
        })
    }

    fn run_script(&self, graph: &PortGraph, index: usize, step: BuildStep, work_dir: &Path) -> Result<bool> {
        let port = graph.port(index);
        let script_path = work_dir.join("script.sh");
        let script = recipe::build_script(graph.ports_path(), &port.path, &graph.build_functions(index));
        fs::write(&script_path, script).at_path(&script_path)?;

        if let Some(user) = &self.user {
            chown(work_dir, Some(user.uid), Some(user.gid))?;
        }

        if !self
            .confirm
            .confirm(&format!("Do you want run script {}?", script_path.display()))?
        {
            return Ok(false);
        }

        info!("Running {} for {}", step, port.path);
        let mut command = Command::new("/bin/sh");
        command
            .arg(&script_path)
            .arg(step.as_str())
            .current_dir(work_dir)
            .env("HOME", work_dir)
            .env("ROOT", graph.root())
            .stdin(Stdio::null());
        if let Some(user) = &self.user {
            command.gid(user.gid.as_raw()).uid(user.uid.as_raw());
        }

        let status = command.status().at_path(&script_path)?;
        if !status.success() {
            warn!("{} for {} failed: {}", step, port.path, status);
            return Ok(false);
        }

        let package = work_dir.join(PRODUCED_PACKAGE_DIR);
        let (flags, action) = if port.keep_old {
            (InstallFlags::NONE, "Install")
        } else {
            (InstallFlags::UPGRADE, "Upgrade")
        };
        if !self.confirm.confirm(&format!(
            "{} package {}/{} from {}?",
            action,
            port.name,
            port.version,
            package.display()
        ))? {
            return Ok(false);
        }

        let mut db = graph.database()?.with_interrupt(self.interrupt.clone());
        match db.install(&package, flags, self.confirm) {
            Ok(report) => {
                info!("Installed {}/{} ({} files)", report.name, report.version, report.files);
                Ok(true)
            }
            Err(e @ Error::Interrupted(_)) => Err(e),
            Err(e) => {
                warn!("Install of {} failed: {}", port.path, e);
                Ok(false)
            }
        }
    }
}

impl BuildRunner for PortBuildRunner<'_> {
    fn run_step(&mut self, graph: &PortGraph, index: usize, step: BuildStep) -> Result<bool> {
        self.interrupt.check(step.as_str())?;

        let tmp = graph.ports_path().join("tmp");
        fs::create_dir_all(&tmp).at_path(&tmp)?;
        let work_dir = tempfile::Builder::new()
            .prefix("bld.")
            .tempdir_in(&tmp)
            .at_path(&tmp)?;
        debug!("Build directory {}", work_dir.path().display());

        // Removed on drop whatever the outcome
        self.run_script(graph, index, step, work_dir.path())
    }
}
