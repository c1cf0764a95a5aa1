// src/confirm.rs

//! Confirmation prompts
//!
//! Operations that touch the filesystem or run build scripts ask a
//! `Confirm` implementation before proceeding. Non-interactive runs use
//! `AssumeYes`; `-i` swaps in `TerminalConfirm`.

use crate::error::{Error, Result};
use std::io::{self, BufRead, Write};

/// Answers yes/no questions
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Accepts every question without asking
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on stdout and reads `y`/`n` lines from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        let stdin = io::stdin();
        ask(question, &mut stdin.lock(), &mut io::stdout())
    }
}

fn ask(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> Result<bool> {
    write!(output, "{} [y/n]", question)?;
    output.flush()?;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            // stdin closed before an answer
            return Err(Error::AbortedByUser);
        }
        writeln!(output)?;
        match line.trim_end_matches('\n') {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => {
                write!(output, "[y/n]")?;
                output.flush()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ask_retries_until_answer() {
        let mut input = Cursor::new("maybe\nn\n");
        let mut output = Vec::new();

        let answer = ask("Remove package foo/1.0?", &mut input, &mut output).unwrap();

        assert!(!answer);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.starts_with("Remove package foo/1.0? [y/n]"));
        assert_eq!(shown.matches("[y/n]").count(), 2);
    }

    #[test]
    fn test_ask_eof_aborts() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let result = ask("Continue?", &mut input, &mut output);
        assert!(matches!(result, Err(Error::AbortedByUser)));
    }

    #[test]
    fn test_assume_yes() {
        assert!(AssumeYes.confirm("anything").unwrap());
    }
}
