//! Async-signal-safe output to standard error.
//!
//! Only `write(2)` is used: no `std::io::Stderr` (it takes a reentrant lock)
//! and no buffering, so these helpers are callable from the signal handler.

use std::ffi::c_int;

use testkit_core::config::STDERR_FD;
use testkit_core::report::LineBuf;

/// Write all of `bytes` to `fd`, retrying on `EINTR` and short writes.
///
/// Errors are dropped: there is nowhere left to report them.
pub(crate) fn write_all_fd(fd: c_int, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        // SAFETY: `bytes` is a live slice; write(2) is async-signal-safe.
        let rc = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if rc > 0 {
            bytes = &bytes[rc as usize..];
        } else if rc < 0 && last_errno() == libc::EINTR {
            continue;
        } else {
            return;
        }
    }
}

#[inline]
pub(crate) fn write_stderr(bytes: &[u8]) {
    write_all_fd(STDERR_FD, bytes);
}

#[inline]
pub(crate) fn emit<const N: usize>(line: &LineBuf<N>) {
    write_stderr(line.as_bytes());
}

/// Current thread's errno. Reads the thread-local slot only; no allocation.
#[inline]
pub(crate) fn last_errno() -> c_int {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
