// src/interrupt.rs

//! Cooperative interruption
//!
//! Signal handlers only flip a flag. Long-running operations poll it at
//! checkpoints and unwind with `Error::Interrupted`, which drops every
//! scoped resource (temp directories, the database lock) on the way out.
//! Child processes that are already running are not touched.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared interruption flag
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Checkpoint: fail with `Interrupted` if a signal arrived
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_triggered() {
            Err(Error::Interrupted(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_after_trigger() {
        let interrupt = Interrupt::new();
        assert!(interrupt.check("install").is_ok());

        let clone = interrupt.clone();
        clone.trigger();

        assert!(interrupt.is_triggered());
        assert!(matches!(interrupt.check("install"), Err(Error::Interrupted(op)) if op == "install"));
    }
}
