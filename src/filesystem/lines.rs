// src/filesystem/lines.rs

//! Newline-delimited list files

use crate::error::{IoContext, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Read non-empty lines from a file
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).at_path(path)?;
    Ok(content
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Write one entry per line, each terminated by `\n`
pub fn write_lines<S: AsRef<str>>(lines: &[S], path: &Path) -> Result<()> {
    let file = File::create(path).at_path(path)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line.as_ref()).at_path(path)?;
    }
    writer.flush().at_path(path)
}

/// Read a sentinel file, dropping a single trailing newline
pub fn read_first_line(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).at_path(path)?;
    let line = content.split('\n').next().unwrap_or_default();
    Ok(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_skip_blank_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("list");
        fs::write(&path, "b\n\na\nc").unwrap();

        assert_eq!(read_lines(&path).unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_write_then_read_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("list");
        write_lines(&["bin/foo", "share/doc"], &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "bin/foo\nshare/doc\n");
        assert_eq!(read_lines(&path).unwrap(), vec!["bin/foo", "share/doc"]);
    }

    #[test]
    fn test_read_first_line_trims_newline() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".name");
        fs::write(&path, "foo\n").unwrap();
        assert_eq!(read_first_line(&path).unwrap(), "foo");
    }
}
