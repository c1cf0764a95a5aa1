// src/ports/status.rs

//! Per-port scheduling state
//!
//! Flags only ever get set during a run. The scheduler's fixed point
//! relies on that: every pass either sets at least one new flag or ends
//! the loop, and there are `ports * Status::ALL.len()` flags in total.

use std::fmt;

/// One scheduling flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Only needed to build other ports
    BuildTime,
    /// Part of the requested work
    MarkToProcess,
    /// Installed and every runtime dependency finished
    Finished,
    /// Build failed; the port is abandoned for this run
    HaveError,
    /// The expected package version is installed
    Actual,
    /// No prebuilt package; build from source
    MarkToBuild,
    /// A build-time port some live build is waiting on
    BuildTimeNeeded,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::BuildTime,
        Status::MarkToProcess,
        Status::Finished,
        Status::HaveError,
        Status::Actual,
        Status::MarkToBuild,
        Status::BuildTimeNeeded,
    ];

    fn bit(self) -> u8 {
        match self {
            Status::BuildTime => 1,
            Status::MarkToProcess => 1 << 1,
            Status::Finished => 1 << 2,
            Status::HaveError => 1 << 3,
            Status::Actual => 1 << 4,
            Status::MarkToBuild => 1 << 5,
            Status::BuildTimeNeeded => 1 << 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::BuildTime => "build-time",
            Status::MarkToProcess => "mark-to-process",
            Status::Finished => "finished",
            Status::HaveError => "have-error",
            Status::Actual => "actual",
            Status::MarkToBuild => "mark-to-build",
            Status::BuildTimeNeeded => "build-time-needed",
        }
    }
}

/// Set of flags, set-only
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStatus(u8);

impl PortStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(self, status: Status) -> bool {
        self.0 & status.bit() != 0
    }

    /// Set a flag; returns true if it was not set before
    pub fn insert(&mut self, status: Status) -> bool {
        let changed = !self.contains(status);
        self.0 |= status.bit();
        changed
    }

    pub fn iter(self) -> impl Iterator<Item = Status> {
        Status::ALL.into_iter().filter(move |s| self.contains(*s))
    }

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl fmt::Debug for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Status::as_str)).finish()
    }
}
