//! Platform backtrace facility.
//!
//! glibc and Darwin libc both ship `backtrace(3)` and
//! `backtrace_symbols_fd(3)`; the latter writes straight to a descriptor
//! without calling `malloc`, which is what makes it usable from the handler.
//! Elsewhere capture reports zero frames and the handler says so.

use std::ffi::{c_int, c_void};

#[cfg(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple"))]
mod sys {
    use std::ffi::{c_int, c_void};

    unsafe extern "C" {
        pub fn backtrace(buffer: *mut *mut c_void, size: c_int) -> c_int;
        pub fn backtrace_symbols_fd(buffer: *const *mut c_void, size: c_int, fd: c_int);
    }
}

/// Fill `frames` with return addresses, innermost first. Returns the count.
#[cfg(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple"))]
pub(crate) fn capture(frames: &mut [*mut c_void]) -> usize {
    let cap = c_int::try_from(frames.len()).unwrap_or(c_int::MAX);
    // SAFETY: `frames` has room for `cap` pointers.
    let n = unsafe { sys::backtrace(frames.as_mut_ptr(), cap) };
    usize::try_from(n).unwrap_or(0)
}

#[cfg(not(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple")))]
pub(crate) fn capture(_frames: &mut [*mut c_void]) -> usize {
    0
}

/// Write one symbolic line per frame to `fd`.
#[cfg(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple"))]
pub(crate) fn symbolize_to(fd: c_int, frames: &[*mut c_void]) {
    if frames.is_empty() {
        return;
    }
    let n = c_int::try_from(frames.len()).unwrap_or(c_int::MAX);
    // SAFETY: `frames` holds `n` addresses produced by `capture`.
    unsafe { sys::backtrace_symbols_fd(frames.as_ptr(), n, fd) };
}

#[cfg(not(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple")))]
pub(crate) fn symbolize_to(_fd: c_int, _frames: &[*mut c_void]) {}

/// Take one backtrace outside signal context.
///
/// glibc loads its unwinder with `dlopen` on first use, which allocates; doing
/// that at install time keeps the in-handler call allocation-free.
pub(crate) fn prime() -> usize {
    let mut frames = [std::ptr::null_mut(); 4];
    capture(&mut frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple"))]
    #[test]
    fn captures_frames_outside_signal_context() {
        assert!(prime() > 0);
        let mut frames = [std::ptr::null_mut(); 100];
        let n = capture(&mut frames);
        assert!(n > 0 && n <= 100);
        assert!(frames[..n].iter().all(|f| !f.is_null()));
    }

    #[test]
    fn capture_respects_buffer_length() {
        let mut frames = [std::ptr::null_mut(); 2];
        assert!(capture(&mut frames) <= 2);
        let mut none: [*mut c_void; 0] = [];
        assert_eq!(capture(&mut none), 0);
    }
}
