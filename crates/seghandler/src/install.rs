//! Handler registration and the shim state machine.
//!
//! State is a single `AtomicU8` rather than a `OnceLock`: the loader
//! constructor runs before the Rust runtime is set up, and the handler has to
//! publish `Firing` without taking a lock.

use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};

use testkit_core::config::LINE_CAPACITY;
use testkit_core::error::InstallError;
use testkit_core::report::{self, LineBuf};
use testkit_core::signal::{FATAL_SIGNALS, FatalSignal};
use testkit_core::state::ShimState;

use crate::diag::{self, last_errno};
use crate::{altstack, backtrace, handler};

static STATE: AtomicU8 = AtomicU8::new(ShimState::Uninstalled.as_u8());

/// Result of a successful [`install`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// This call armed the shim.
    Installed,
    /// An earlier call (usually the loader constructor) already did.
    AlreadyInstalled,
}

/// Current lifecycle state.
#[must_use]
pub fn state() -> ShimState {
    ShimState::from_u8(STATE.load(Ordering::Acquire))
}

pub(crate) fn set_state(next: ShimState) {
    STATE.store(next.as_u8(), Ordering::Release);
}

/// Arm the shim: register the alternate stack for the calling thread and take
/// over `SIGSEGV`, `SIGABRT` and `SIGBUS`.
///
/// Idempotent. Writes one confirmation line to stderr on success, or one
/// diagnostic line on failure; a failure leaves the process running with its
/// previous signal dispositions, and a later call may retry.
pub fn install() -> Result<InstallOutcome, InstallError> {
    let current = state();
    if !current.can_begin_install() {
        return Ok(InstallOutcome::AlreadyInstalled);
    }
    if STATE
        .compare_exchange(
            current.as_u8(),
            ShimState::Installing.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_err()
    {
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    let mut line = LineBuf::<LINE_CAPACITY>::new();
    match arm() {
        Ok(()) => {
            set_state(ShimState::Installed);
            report::install_banner(&mut line, &FATAL_SIGNALS, altstack::usable_size());
            diag::emit(&line);
            Ok(InstallOutcome::Installed)
        }
        Err(err) => {
            set_state(ShimState::Failed);
            report::install_failure(&mut line, &err);
            diag::emit(&line);
            Err(err)
        }
    }
}

fn arm() -> Result<(), InstallError> {
    altstack::ensure_registered()?;
    backtrace::prime();
    register_all(register)
}

/// Register every fatal signal with `register`, restoring the ones already
/// replaced if a later one fails.
fn register_all(
    mut register: impl FnMut(FatalSignal) -> Result<libc::sigaction, InstallError>,
) -> Result<(), InstallError> {
    let mut previous: [Option<libc::sigaction>; FATAL_SIGNALS.len()] = [None; FATAL_SIGNALS.len()];
    for (i, &sig) in FATAL_SIGNALS.iter().enumerate() {
        match register(sig) {
            Ok(old) => previous[i] = Some(old),
            Err(err) => {
                restore(&previous[..i]);
                return Err(err);
            }
        }
    }
    Ok(())
}

fn register(sig: FatalSignal) -> Result<libc::sigaction, InstallError> {
    // SAFETY: all-zero is a valid sigaction (SIG_DFL, empty mask, no flags).
    let mut act: libc::sigaction = unsafe { mem::zeroed() };
    act.sa_sigaction = handler::on_fatal_signal as *const () as libc::sighandler_t;
    act.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK | libc::SA_NODEFER;
    // SAFETY: sa_mask is owned by `act`.
    unsafe { libc::sigemptyset(&mut act.sa_mask) };

    // SAFETY: as above.
    let mut old: libc::sigaction = unsafe { mem::zeroed() };
    // SAFETY: both structs are live for the call.
    if unsafe { libc::sigaction(sig.signum(), &act, &mut old) } != 0 {
        return Err(InstallError::Handler {
            signal: sig,
            errno: last_errno(),
        });
    }
    Ok(old)
}

/// Put back dispositions replaced before a registration failure.
fn restore(previous: &[Option<libc::sigaction>]) {
    for (&sig, old) in FATAL_SIGNALS.iter().zip(previous) {
        if let Some(old) = old {
            // SAFETY: `old` was filled in by the kernel for this signal.
            unsafe { libc::sigaction(sig.signum(), old, std::ptr::null_mut()) };
        }
    }
}

/// Handler currently registered for `sig`, as a raw `sa_sigaction` value.
#[cfg(test)]
#[must_use]
pub(crate) fn registered_handler(sig: FatalSignal) -> Option<libc::sighandler_t> {
    // SAFETY: zeroed out-parameter; query only.
    let mut cur: libc::sigaction = unsafe { mem::zeroed() };
    // SAFETY: null `act` only reads the disposition.
    if unsafe { libc::sigaction(sig.signum(), std::ptr::null(), &mut cur) } != 0 {
        return None;
    }
    Some(cur.sa_sigaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_int;

    extern "C" fn placeholder(_: c_int) {}

    fn set_placeholder(sig: FatalSignal) -> libc::sigaction {
        // SAFETY: zeroed sigaction with a plain handler is valid.
        let mut act: libc::sigaction = unsafe { mem::zeroed() };
        act.sa_sigaction = placeholder as *const () as libc::sighandler_t;
        // SAFETY: as above.
        let mut old: libc::sigaction = unsafe { mem::zeroed() };
        // SAFETY: both structs are live for the call.
        assert_eq!(unsafe { libc::sigaction(sig.signum(), &act, &mut old) }, 0);
        old
    }

    #[test]
    fn failed_registration_restores_earlier_signals() {
        let _guard = crate::tests::SIGNAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let before: Vec<_> = FATAL_SIGNALS.iter().map(|&s| registered_handler(s)).collect();

        let mut calls = 0;
        let err = register_all(|sig| {
            calls += 1;
            if sig == FatalSignal::Bus {
                return Err(InstallError::Handler { signal: sig, errno: libc::EINVAL });
            }
            Ok(set_placeholder(sig))
        })
        .unwrap_err();

        assert_eq!(calls, FATAL_SIGNALS.len());
        assert_eq!(err, InstallError::Handler { signal: FatalSignal::Bus, errno: libc::EINVAL });
        let after: Vec<_> = FATAL_SIGNALS.iter().map(|&s| registered_handler(s)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn first_failure_leaves_everything_alone() {
        let _guard = crate::tests::SIGNAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let before: Vec<_> = FATAL_SIGNALS.iter().map(|&s| registered_handler(s)).collect();
        let err = register_all(|sig| Err(InstallError::Handler { signal: sig, errno: libc::EPERM }));
        assert!(err.is_err());
        let after: Vec<_> = FATAL_SIGNALS.iter().map(|&s| registered_handler(s)).collect();
        assert_eq!(before, after);
    }
}
