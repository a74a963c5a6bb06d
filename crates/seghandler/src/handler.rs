//! The fatal-signal handler.
//!
//! Runs on the alternate stack, writes the report with raw `write(2)` calls and
//! leaves through `_exit(128 + signum)`. It never returns to the faulting code.
//!
//! Calls reachable from here are `write`, `_exit`, `pause`, the raw `gettid`
//! syscall, atomics, and `backtrace`/`backtrace_symbols_fd` (primed at install
//! time so they do not allocate). Off Linux the thread identity comes from
//! `pthread_self`, which POSIX does not list as async-signal-safe but which
//! only reads the thread pointer on the supported libcs.

use std::ffi::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use testkit_core::{FatalSignal, ShimState};
use testkit_core::config::{LINE_CAPACITY, MAX_FRAMES, STDERR_FD};
use testkit_core::report::{self, LineBuf};
use testkit_core::signal::exit_status_for;

use crate::{backtrace, diag, install};

/// Identity of the thread writing the report; 0 while idle.
static FIRING_THREAD: AtomicUsize = AtomicUsize::new(0);
/// Signal that started the report.
static FIRST_SIGNAL: AtomicI32 = AtomicI32::new(0);

type Line = LineBuf<LINE_CAPACITY>;

#[cfg(any(target_os = "linux", target_os = "android"))]
#[inline]
fn current_thread() -> usize {
    // SAFETY: gettid has no arguments and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as usize }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
#[inline]
fn current_thread() -> usize {
    // SAFETY: pthread_self has no preconditions.
    unsafe { libc::pthread_self() as usize }
}

/// Signals whose `si_addr` names the faulting memory.
fn has_fault_address(signum: c_int) -> bool {
    matches!(
        FatalSignal::from_signum(signum),
        Some(FatalSignal::Segv | FatalSignal::Bus)
    )
}

/// Fault address from the kernel-provided record.
///
/// # Safety
///
/// `info` must point at the `siginfo_t` passed to an `SA_SIGINFO` handler.
unsafe fn fault_address(info: *const libc::siginfo_t) -> usize {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        // SAFETY: forwarded from the caller.
        unsafe { (*info).si_addr() as usize }
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        // SAFETY: forwarded from the caller.
        unsafe { (*info).si_addr as usize }
    }
}

/// `sa_sigaction` entry point registered for every fatal signal.
pub(crate) extern "C" fn on_fatal_signal(
    signum: c_int,
    info: *mut libc::siginfo_t,
    _ucontext: *mut c_void,
) {
    let me = current_thread();
    match FIRING_THREAD.compare_exchange(0, me, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {}
        // Fault inside our own report (SA_NODEFER lets it through).
        Err(owner) if owner == me => bail_out(signum),
        // Another thread is reporting and will end the process.
        Err(_) => park(),
    }
    FIRST_SIGNAL.store(signum, Ordering::Release);
    install::set_state(ShimState::Firing);

    let mut line = Line::new();
    write_report(&mut line, signum, info);
    terminate(&mut line, signum)
}

fn write_report(line: &mut Line, signum: c_int, info: *const libc::siginfo_t) {
    report::header(line, signum);
    diag::emit(line);

    if !info.is_null() && has_fault_address(signum) {
        // SAFETY: non-null `info` comes from the kernel for SA_SIGINFO handlers.
        let (addr, code) = unsafe { (fault_address(info), (*info).si_code) };
        report::fault(line, addr, code);
        diag::emit(line);
    }

    let mut frames: [*mut c_void; MAX_FRAMES] = [ptr::null_mut(); MAX_FRAMES];
    let depth = backtrace::capture(&mut frames);
    report::frames(line, depth);
    diag::emit(line);
    backtrace::symbolize_to(STDERR_FD, &frames[..depth]);
}

fn terminate(line: &mut Line, signum: c_int) -> ! {
    let status = exit_status_for(signum);
    report::exiting(line, status);
    diag::emit(line);
    // SAFETY: _exit skips atexit handlers and destructors, which is the point.
    unsafe { libc::_exit(status) }
}

/// Nested entry on the reporting thread: stop reporting, keep the status of
/// the signal that started it.
fn bail_out(signum: c_int) -> ! {
    let first = match FIRST_SIGNAL.load(Ordering::Acquire) {
        0 => signum,
        s => s,
    };
    let mut line = Line::new();
    report::nested_fault(&mut line, signum);
    diag::emit(&line);
    // SAFETY: as in `terminate`.
    unsafe { libc::_exit(exit_status_for(first)) }
}

fn park() -> ! {
    loop {
        // SAFETY: pause is async-signal-safe; the reporting thread's _exit
        // ends the process.
        unsafe { libc::pause() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_memory_signals_carry_an_address() {
        assert!(has_fault_address(libc::SIGSEGV));
        assert!(has_fault_address(libc::SIGBUS));
        assert!(!has_fault_address(libc::SIGABRT));
        assert!(!has_fault_address(libc::SIGFPE));
    }

    #[test]
    fn thread_identity_is_stable_and_distinct() {
        let me = current_thread();
        assert_ne!(me, 0);
        assert_eq!(me, current_thread());
        let other = std::thread::spawn(current_thread).join().expect("thread");
        assert_ne!(me, other);
    }
}
