//! # seghandler
//!
//! Crash diagnostic shim. Loading the shared object installs handlers for
//! `SIGSEGV`, `SIGABRT` and `SIGBUS`; when one fires, the handler runs on a
//! dedicated alternate stack and writes to stderr:
//!
//! ```text
//! seghandler: caught SIGNAL 11 (SIGSEGV)
//! seghandler: fault address 0x0000000000000000, si_code 1
//! seghandler: backtrace (9 frames):
//! ./app(+0x1d3a)[0x55d0c0a01d3a]
//! ...
//! seghandler: exiting with status 139
//! ```
//!
//! and then `_exit(128 + signum)` without running any cleanup.
//!
//! # Lifecycle
//!
//! ```text
//! Uninstalled -> Installing -> Installed -> Firing -> (process exits)
//!                      \-> Failed --(install() retry)--^
//! ```
//!
//! Install failures are reported and swallowed; the host keeps running
//! unprotected.
//!
//! The alternate stack is per thread. Threads spawned after the shim is
//! installed should call [`register_thread`] so that a stack overflow on them
//! is reported too.

mod altstack;
mod backtrace;
#[cfg(feature = "auto-install")]
mod ctor;
mod diag;
mod handler;
mod install;

pub use altstack::register_thread;
pub use install::{InstallOutcome, install, state};
pub use testkit_core::{FatalSignal, InstallError, ShimState};
