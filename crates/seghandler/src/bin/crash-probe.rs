//! Test driver for the crash shim.
//!
//! `crash-probe [--no-install] <action>` arms the shim (unless told not to,
//! e.g. when it is injected with `LD_PRELOAD`) and then performs one action:
//!
//! - `clean`: exit 0;
//! - `null-deref`: read through a null pointer (SIGSEGV);
//! - `abort`: `abort(3)` (SIGABRT);
//! - `bus-error`: touch a page mapped past the end of an empty file (SIGBUS);
//! - `stack-overflow`: unbounded recursion on the main thread (SIGSEGV with
//!   the normal stack exhausted);
//! - `thread-overflow`: the same on a spawned thread that registered its own
//!   alternate stack;
//! - `concurrent-faults`: several threads dereference null at once;
//! - `nested-fault`: chain into the installed `SIGBUS` handler with a bogus
//!   `siginfo_t`, so the handler faults while reporting;
//! - `install-failure` (Linux, with `--no-install`): arm the shim under an
//!   address-space limit that leaves no room for the alternate stack, then
//!   check that nothing was taken over. Exits 0 when the shim reported the
//!   failure and left the dispositions alone, 3 when it was already armed.

use std::ffi::{c_int, c_void};
use std::fs::OpenOptions;
use std::hint::black_box;
use std::os::fd::AsRawFd;
use std::process::{self, ExitCode};
use std::ptr;
use std::sync::{Arc, Barrier};
use std::thread;

const FAULTING_THREADS: usize = 4;

fn null_deref() -> ExitCode {
    let p: *const libc::c_char = black_box(ptr::null());
    // SAFETY: deliberately invalid; the shim reports the fault.
    let n = unsafe { libc::strlen(p) };
    eprintln!("crash-probe: strlen(NULL) returned {n}");
    ExitCode::FAILURE
}

fn bus_error() -> ExitCode {
    let path = std::env::temp_dir().join(format!("crash-probe-bus-{}", process::id()));
    let file = match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => f,
        Err(err) => {
            eprintln!("crash-probe: cannot create {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };
    // The mapping outlives the name.
    let _ = std::fs::remove_file(&path);

    let len = 4096;
    // SAFETY: shared read-only mapping of an open descriptor.
    let map = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    };
    if map == libc::MAP_FAILED {
        eprintln!("crash-probe: mmap failed: {}", std::io::Error::last_os_error());
        return ExitCode::FAILURE;
    }
    // SAFETY: deliberately past EOF; the kernel raises SIGBUS.
    let byte = unsafe { ptr::read_volatile(map.cast::<u8>()) };
    eprintln!("crash-probe: read {byte} past end of file");
    ExitCode::FAILURE
}

#[inline(never)]
#[allow(unconditional_recursion)]
fn recurse(depth: u64) -> u64 {
    let mut frame = [depth; 128];
    black_box(&mut frame);
    frame[0].wrapping_add(recurse(depth + 1))
}

fn thread_overflow() -> ExitCode {
    let child = thread::Builder::new()
        .stack_size(256 * 1024)
        .spawn(|| {
            if let Err(err) = seghandler::register_thread() {
                eprintln!("crash-probe: register_thread: {err}");
                return 0;
            }
            recurse(0)
        });
    match child.map(|h| h.join()) {
        Ok(Ok(n)) => eprintln!("crash-probe: thread recursion returned {n}"),
        Ok(Err(_)) => eprintln!("crash-probe: thread panicked"),
        Err(err) => eprintln!("crash-probe: spawn: {err}"),
    }
    ExitCode::FAILURE
}

fn concurrent_faults() -> ExitCode {
    let start = Arc::new(Barrier::new(FAULTING_THREADS));
    let handles: Vec<_> = (0..FAULTING_THREADS)
        .map(|_| {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                null_deref()
            })
        })
        .collect();
    for h in handles {
        let _ = h.join();
    }
    ExitCode::FAILURE
}

type SigactionFn = extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void);

fn current_action(signum: c_int) -> Option<libc::sigaction> {
    // SAFETY: zeroed out-parameter; null `act` only queries.
    let mut cur: libc::sigaction = unsafe { std::mem::zeroed() };
    // SAFETY: as above.
    (unsafe { libc::sigaction(signum, ptr::null(), &mut cur) } == 0).then_some(cur)
}

fn nested_fault() -> ExitCode {
    let Some(act) = current_action(libc::SIGBUS) else {
        eprintln!("crash-probe: cannot query SIGBUS");
        return ExitCode::FAILURE;
    };
    if act.sa_flags & libc::SA_SIGINFO == 0 {
        eprintln!("crash-probe: SIGBUS has no siginfo handler");
        return ExitCode::FAILURE;
    }
    // SAFETY: SA_SIGINFO says `sa_sigaction` holds a three-argument handler.
    let chained: SigactionFn = unsafe { std::mem::transmute(act.sa_sigaction) };
    // Unmapped, non-null: reading it faults inside the report.
    let bogus = black_box(8usize) as *mut libc::siginfo_t;
    chained(libc::SIGBUS, bogus, ptr::null_mut());
    eprintln!("crash-probe: chained handler returned");
    ExitCode::FAILURE
}

#[cfg(target_os = "linux")]
fn install_failure() -> ExitCode {
    use seghandler::ShimState;

    if seghandler::state() != ShimState::Uninstalled {
        eprintln!("crash-probe: shim already armed");
        return ExitCode::from(3);
    }
    let before: Vec<_> = [libc::SIGSEGV, libc::SIGABRT, libc::SIGBUS]
        .iter()
        .map(|&s| current_action(s).map(|a| a.sa_sigaction))
        .collect();

    let Some(in_use) = std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| s.split_whitespace().next()?.parse::<u64>().ok())
    else {
        eprintln!("crash-probe: cannot read /proc/self/statm");
        return ExitCode::FAILURE;
    };
    // SAFETY: sysconf has no preconditions.
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as u64;

    // SAFETY: zeroed out-parameter for getrlimit.
    let mut saved: libc::rlimit = unsafe { std::mem::zeroed() };
    // SAFETY: `saved` is live for the call.
    if unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut saved) } != 0 {
        eprintln!("crash-probe: getrlimit failed");
        return ExitCode::FAILURE;
    }
    // A few pages of slack for stack growth; the alternate stack needs 17.
    let tight = libc::rlimit {
        rlim_cur: (in_use + 8) * page,
        rlim_max: saved.rlim_max,
    };
    // SAFETY: lowering the soft limit only.
    if unsafe { libc::setrlimit(libc::RLIMIT_AS, &tight) } != 0 {
        eprintln!("crash-probe: setrlimit failed");
        return ExitCode::FAILURE;
    }
    let outcome = seghandler::install();
    // SAFETY: restores the limit read above.
    unsafe { libc::setrlimit(libc::RLIMIT_AS, &saved) };

    let after: Vec<_> = [libc::SIGSEGV, libc::SIGABRT, libc::SIGBUS]
        .iter()
        .map(|&s| current_action(s).map(|a| a.sa_sigaction))
        .collect();
    match outcome {
        Err(_) if seghandler::state() == ShimState::Failed && before == after => ExitCode::SUCCESS,
        other => {
            eprintln!("crash-probe: install returned {other:?}, state {:?}", seghandler::state());
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn install_failure() -> ExitCode {
    eprintln!("crash-probe: install-failure needs Linux");
    ExitCode::from(3)
}

fn main() -> ExitCode {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let install = match args.first().map(String::as_str) {
        Some("--no-install") => {
            args.remove(0);
            false
        }
        _ => true,
    };
    if install {
        // Reported on stderr either way; the probe runs regardless.
        let _ = seghandler::install();
    }

    match args.first().map(String::as_str) {
        Some("clean") => ExitCode::SUCCESS,
        Some("null-deref") => null_deref(),
        Some("abort") => process::abort(),
        Some("bus-error") => bus_error(),
        Some("stack-overflow") => {
            let n = recurse(0);
            eprintln!("crash-probe: recursion returned {n}");
            ExitCode::FAILURE
        }
        Some("thread-overflow") => thread_overflow(),
        Some("concurrent-faults") => concurrent_faults(),
        Some("nested-fault") => nested_fault(),
        Some("install-failure") => install_failure(),
        other => {
            eprintln!("crash-probe: unknown action {other:?}");
            ExitCode::from(2)
        }
    }
}
