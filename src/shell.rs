// src/shell.rs

//! Script engine used to evaluate port recipes
//!
//! Recipes are shell fragments. Rather than parse them, a long-lived
//! `/bin/sh` is driven over its stdin/stdout: commands are written to the
//! interpreter, and variable values are read back one line per request.
//! Sourced files have their stdout redirected to stderr so recipe output
//! never reaches the response stream.

use crate::error::{Error, IoContext, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, trace};

/// Command interpreter that keeps state between calls
pub trait ScriptEngine {
    /// Evaluate script text in the interpreter's current environment
    fn run(&mut self, script: &str) -> Result<()>;

    /// Source a file if it exists
    fn run_file(&mut self, path: &Path) -> Result<()>;

    /// Current value of a variable, whitespace runs folded to single spaces
    fn read_variable(&mut self, name: &str) -> Result<String>;
}

/// `/bin/sh` child process driven over two pipes
pub struct Shell {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Shell {
    /// Spawn the interpreter
    pub fn spawn() -> Result<Self> {
        let mut child = Command::new("/bin/sh")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .at_path("/bin/sh")?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::ProcessDied("shell stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ProcessDied("shell stdout unavailable".to_string()))?;

        debug!("Started script engine pid {}", child.id());
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line)?;
        if read == 0 {
            return Err(self.died());
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(line)
    }

    fn died(&mut self) -> Error {
        match self.child.try_wait() {
            Ok(Some(status)) => Error::ProcessDied(format!("status = {}", status)),
            Ok(None) => Error::ProcessDied("shell closed its output".to_string()),
            Err(e) => Error::ProcessDied(format!("wait: {}", e)),
        }
    }
}

impl ScriptEngine for Shell {
    fn run(&mut self, script: &str) -> Result<()> {
        trace!("shell <- {}", script);
        let written = self
            .stdin
            .write_all(script.as_bytes())
            .and_then(|()| self.stdin.flush());
        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Err(self.died()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn run_file(&mut self, path: &Path) -> Result<()> {
        let quoted = shell_quote(&path.to_string_lossy());
        self.run(&format!("test -f {q} && . {q} >&2\n", q = quoted))
    }

    fn read_variable(&mut self, name: &str) -> Result<String> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidPackage(format!("bad variable name: {:?}", name)));
        }
        self.run(&format!("printf '%s\\n' \"${}\" | tr '\\n' ' '; echo\n", name))?;
        let line = self.read_line()?;
        Ok(line.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Ok(pid) = i32::try_from(self.child.id()) {
            let _ = kill(Pid::from_raw(pid), Signal::SIGINT);
        }
        let _ = self.child.wait();
    }
}

/// Quote a string as a single shell word
///
/// ```
/// use pkgport::shell::shell_quote;
///
/// assert_eq!(shell_quote("it's"), r"'it'\''s'");
/// ```
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_state_persists_between_calls() {
        let mut shell = Shell::spawn().unwrap();
        shell.run("NAME='foo'\nDEPENDS='a\n  b   c'\n").unwrap();

        assert_eq!(shell.read_variable("NAME").unwrap(), "foo");
        assert_eq!(shell.read_variable("DEPENDS").unwrap(), "a b c");
        assert_eq!(shell.read_variable("UNSET_VARIABLE").unwrap(), "");
    }

    #[test]
    fn test_run_file_output_does_not_leak() {
        let temp_dir = tempfile::tempdir().unwrap();
        let recipe = temp_dir.path().join("build.sh");
        fs::write(&recipe, "echo noise\nVERSION=1.2\n").unwrap();

        let mut shell = Shell::spawn().unwrap();
        shell.run_file(&recipe).unwrap();
        shell.run_file(&temp_dir.path().join("missing.sh")).unwrap();

        assert_eq!(shell.read_variable("VERSION").unwrap(), "1.2");
    }

    #[test]
    fn test_dead_shell_reports_process_died() {
        let mut shell = Shell::spawn().unwrap();
        shell.run("exit 3\n").unwrap();
        let result = shell.read_variable("NAME");
        assert!(matches!(result, Err(Error::ProcessDied(_))));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("a'b"), "'a'\\''b'");
    }

    #[test]
    fn test_read_variable_rejects_expressions() {
        let mut shell = Shell::spawn().unwrap();
        assert!(shell.read_variable("$(true)").is_err());
    }
}
