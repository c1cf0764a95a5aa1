// src/db/hooks.rs

//! Post-install hooks
//!
//! Every executable in `<root>/usr/lib/pkg-hooks/` runs after a package is
//! committed, with `ROOT` set to the install root and the package
//! directory as working directory. Hooks are outside the transaction: a
//! failing hook is reported but does not undo the install.

use crate::config::HOOKS_DIR;
use crate::error::{Error, Result};
use crate::filesystem::root_join;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Run all hook scripts; returns how many were started
pub fn run_post_install_hooks(root: &Path, working_dir: &Path) -> Result<usize> {
    let hooks_dir = root_join(root, HOOKS_DIR)?;
    let pattern = format!("{}/*", glob::Pattern::escape(&hooks_dir.to_string_lossy()));

    let scripts = match find_scripts(&pattern) {
        Ok(scripts) => scripts,
        Err(Error::NoMatch(_)) | Err(Error::GlobAborted(_)) => {
            info!("Post-install scripts not available");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let mut started = 0;
    for script in scripts {
        if !is_executable(&script) {
            debug!("Skipping non-executable hook {}", script.display());
            continue;
        }

        info!("Running hook {}", script.display());
        let status = Command::new(&script)
            .current_dir(working_dir)
            .env("ROOT", root)
            .stdin(Stdio::null())
            .status();
        started += 1;

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("Hook {} exited with {}", script.display(), status),
            Err(e) => warn!("Hook {} failed to start: {}", script.display(), e),
        }
    }
    Ok(started)
}

/// Expand `pattern`, failing with `NoMatch` when nothing matches
fn find_scripts(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry.map_err(|e| Error::GlobAborted(e.to_string()))?;
        scripts.push(path);
    }
    if scripts.is_empty() {
        return Err(Error::NoMatch(pattern.to_string()));
    }
    Ok(scripts)
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_hook_directory_is_not_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let started = run_post_install_hooks(temp_dir.path(), temp_dir.path()).unwrap();
        assert_eq!(started, 0);
    }

    #[test]
    fn test_find_scripts_no_match() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*", temp_dir.path().display());
        assert!(matches!(find_scripts(&pattern), Err(Error::NoMatch(_))));
    }

    #[test]
    fn test_hooks_see_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let hooks = root.join(HOOKS_DIR);
        fs::create_dir_all(&hooks).unwrap();

        let marker = root.join("marker");
        let script = hooks.join("10-mark");
        fs::write(&script, "#!/bin/sh\necho \"$ROOT\" > \"$ROOT/marker\"\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(hooks.join("README"), "not a hook").unwrap();

        let started = run_post_install_hooks(root, root).unwrap();

        assert_eq!(started, 1);
        let written = fs::read_to_string(marker).unwrap();
        assert_eq!(written.trim_end(), root.display().to_string());
    }
}
