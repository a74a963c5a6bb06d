//! Fatal signal catalogue and the shell exit-status convention.
//!
//! Signal numbers come from `libc` so `SIGBUS` resolves to 7 on Linux and 10
//! on the BSD family without a hand-maintained table.

use std::fmt;

/// Signals the crash shim takes over.
///
/// `SIGFPE` and `SIGILL` are deliberately absent; they keep their default
/// disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FatalSignal {
    /// Memory access violation.
    Segv = libc::SIGSEGV,
    /// `abort(3)`, failed assertions, Rust double panics.
    Abrt = libc::SIGABRT,
    /// Misaligned or unbacked memory access (e.g. a truncated `mmap`).
    Bus = libc::SIGBUS,
}

/// Registration order used by the installer.
pub const FATAL_SIGNALS: [FatalSignal; 3] = [FatalSignal::Segv, FatalSignal::Abrt, FatalSignal::Bus];

/// Offset shells add to a signal number when reporting signal death.
pub const SIGNAL_EXIT_BASE: i32 = 128;

impl FatalSignal {
    #[must_use]
    pub const fn signum(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn from_signum(signum: i32) -> Option<Self> {
        match signum {
            libc::SIGSEGV => Some(Self::Segv),
            libc::SIGABRT => Some(Self::Abrt),
            libc::SIGBUS => Some(Self::Bus),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Segv => "SIGSEGV",
            Self::Abrt => "SIGABRT",
            Self::Bus => "SIGBUS",
        }
    }

    /// Status the shim passes to `_exit` for this signal.
    #[must_use]
    pub const fn exit_status(self) -> i32 {
        exit_status_for(self.signum())
    }
}

impl fmt::Display for FatalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `128 + signum`, clamped to the 8 bits `_exit` actually reports.
#[must_use]
pub const fn exit_status_for(signum: i32) -> i32 {
    (SIGNAL_EXIT_BASE + signum) & 0xff
}

/// Symbolic name for any signal number the report may mention.
///
/// Unknown or realtime numbers map to `"SIG?"`; the numeric value is always
/// printed next to it, so nothing is lost.
#[must_use]
pub const fn signal_name(signum: i32) -> &'static str {
    if let Some(sig) = FatalSignal::from_signum(signum) {
        return sig.name();
    }
    match signum {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGTRAP => "SIGTRAP",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        _ => "SIG?",
    }
}
