// src/console.rs

//! Process setup shared by the `pkg` and `port` binaries

use crate::error::Result;
use crate::interrupt::Interrupt;
use clap::Parser;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static SIGNAL_INTERRUPT: OnceLock<Interrupt> = OnceLock::new();

/// Log to stderr; `trace` forces debug level over `RUST_LOG`
pub fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse arguments, exiting with status 1 on usage errors
pub fn parse_args<T: Parser>() -> T {
    match T::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

extern "C" fn on_signal(_signal: nix::libc::c_int) {
    if let Some(interrupt) = SIGNAL_INTERRUPT.get() {
        interrupt.trigger();
    }
}

/// Route SIGINT, SIGTERM and SIGHUP to `interrupt`
///
/// Only the first token registered in a process is used.
pub fn install_interrupt_handlers(interrupt: &Interrupt) -> Result<()> {
    let _ = SIGNAL_INTERRUPT.set(interrupt.clone());
    let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::SA_RESTART, SigSet::empty());
    for signal in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
        // SAFETY: the handler only performs an atomic store
        unsafe { sigaction(signal, &action) }?;
    }
    Ok(())
}
