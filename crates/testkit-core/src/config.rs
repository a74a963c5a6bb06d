//! Compile-time configuration for the crash shim.
//!
//! The shim reads no environment variables and has no runtime knobs; these
//! constants are the whole configuration surface.

/// Usable bytes of the alternate signal stack (a guard page is added below).
pub const ALT_STACK_SIZE: usize = 64 * 1024;

/// Return addresses captured per report.
pub const MAX_FRAMES: usize = 100;

/// Descriptor every diagnostic line is written to.
pub const STDERR_FD: i32 = 2;

/// Capacity of a single formatted report line.
pub const LINE_CAPACITY: usize = 256;

/// Prefix carried by every line the shim writes.
pub const LINE_PREFIX: &str = "seghandler: ";

const _: () = assert!(ALT_STACK_SIZE >= 64 * 1024);
const _: () = assert!(MAX_FRAMES >= 100);
const _: () = assert!(LINE_CAPACITY > LINE_PREFIX.len() + 64);
