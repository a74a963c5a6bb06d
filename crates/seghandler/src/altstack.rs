//! Alternate signal stacks.
//!
//! Each stack is one anonymous mapping:
//!
//! ```text
//! [ guard page (PROT_NONE) | ALT_STACK_SIZE usable bytes ]
//!                          ^ ss_sp
//! ```
//!
//! The guard page turns an overflow of the alternate stack into a fault the
//! handler's nested-entry path catches, instead of silent corruption.
//!
//! `sigaltstack` is per thread. The installing thread's stack is mapped once
//! and never unmapped. Other threads call [`register_thread`]; their stack
//! lives in a thread-local and is disabled and unmapped when the thread exits.

use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use testkit_core::config::ALT_STACK_SIZE;
use testkit_core::error::InstallError;

use crate::diag::last_errno;

/// Start of the usable region; null until the mapping exists.
static ALT_STACK_BASE: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw > 0 { raw as usize } else { 4096 }
}

#[must_use]
pub(crate) const fn round_up(len: usize, page: usize) -> usize {
    len.div_ceil(page) * page
}

/// Usable size actually registered with the kernel.
#[must_use]
pub(crate) fn usable_size() -> usize {
    round_up(ALT_STACK_SIZE, page_size())
}

fn mapping_len() -> usize {
    page_size() + usable_size()
}

fn map_stack() -> Result<*mut c_void, InstallError> {
    let page = page_size();
    let total = mapping_len();

    // SAFETY: anonymous private mapping with no address hint.
    let map = unsafe {
        libc::mmap(
            ptr::null_mut(),
            total,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };
    if map == libc::MAP_FAILED {
        return Err(InstallError::AltStackAlloc {
            size: total,
            errno: last_errno(),
        });
    }

    // SAFETY: the first page lies inside the mapping created above.
    if unsafe { libc::mprotect(map, page, libc::PROT_NONE) } != 0 {
        let errno = last_errno();
        // SAFETY: unmapping exactly what we mapped; nothing else refers to it.
        unsafe { libc::munmap(map, total) };
        return Err(InstallError::GuardPage { errno });
    }

    // SAFETY: `page < total`, so the offset stays inside the mapping.
    Ok(unsafe { map.cast::<u8>().add(page) }.cast())
}

/// Map the stack if needed and register it for the calling thread.
///
/// A retry after a failed install reuses an existing mapping.
pub(crate) fn ensure_registered() -> Result<*mut c_void, InstallError> {
    let base = match mapped() {
        Some(base) => base,
        None => {
            let base = map_stack()?;
            ALT_STACK_BASE.store(base, Ordering::Release);
            base
        }
    };

    activate(base)?;
    Ok(base)
}

fn activate(base: *mut c_void) -> Result<(), InstallError> {
    let stack = libc::stack_t {
        ss_sp: base,
        ss_flags: 0,
        ss_size: usable_size(),
    };
    // SAFETY: `stack` describes a live mapping owned by this module.
    if unsafe { libc::sigaltstack(&stack, ptr::null_mut()) } != 0 {
        return Err(InstallError::AltStackRegister {
            errno: last_errno(),
        });
    }
    Ok(())
}

/// Alternate stack currently registered for the calling thread, if any.
#[must_use]
pub(crate) fn active() -> Option<*mut c_void> {
    // SAFETY: zeroed out-parameter; null `ss` only queries.
    let mut cur: libc::stack_t = unsafe { std::mem::zeroed() };
    // SAFETY: as above.
    if unsafe { libc::sigaltstack(ptr::null(), &mut cur) } != 0 {
        return None;
    }
    (cur.ss_flags & libc::SS_DISABLE == 0 && !cur.ss_sp.is_null()).then_some(cur.ss_sp)
}

/// Stack owned by a thread other than the installing one.
struct ThreadStack {
    base: *mut c_void,
}

impl Drop for ThreadStack {
    fn drop(&mut self) {
        if active() == Some(self.base) {
            let off = libc::stack_t {
                ss_sp: ptr::null_mut(),
                ss_flags: libc::SS_DISABLE,
                ss_size: 0,
            };
            // SAFETY: disabling only affects the exiting thread.
            unsafe { libc::sigaltstack(&off, ptr::null_mut()) };
        }
        // SAFETY: `base` sits one page into a mapping of `mapping_len()`
        // bytes made by `map_stack`, and it is no longer registered.
        unsafe {
            let start = self.base.cast::<u8>().sub(page_size()).cast();
            libc::munmap(start, mapping_len());
        }
    }
}

thread_local! {
    static THREAD_STACK: RefCell<Option<ThreadStack>> = const { RefCell::new(None) };
}

/// Give the calling thread its own alternate stack, so a stack overflow on
/// it is still reported.
///
/// Threads a program spawns after the shim owns `SIGSEGV` get no alternate
/// stack from the Rust runtime; call this first thing in such threads.
/// Idempotent per thread. The installing thread already has one.
pub fn register_thread() -> Result<(), InstallError> {
    if let Some(base) = active() {
        let owned = mapped() == Some(base)
            || THREAD_STACK.with(|slot| slot.borrow().as_ref().map(|s| s.base) == Some(base));
        if owned {
            return Ok(());
        }
    }
    let base = map_stack()?;
    let stack = ThreadStack { base };
    activate(base)?;
    THREAD_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
    Ok(())
}

/// Base of the usable region, once mapped.
#[must_use]
pub(crate) fn mapped() -> Option<*mut c_void> {
    let base = ALT_STACK_BASE.load(Ordering::Acquire);
    (!base.is_null()).then_some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_to_pages() {
        assert_eq!(round_up(65536, 4096), 65536);
        assert_eq!(round_up(65537, 4096), 69632);
        assert_eq!(round_up(1, 16384), 16384);
        assert_eq!(round_up(0, 4096), 0);
    }

    #[test]
    fn thread_stack_is_registered_and_released() {
        std::thread::spawn(|| {
            register_thread().expect("register");
            let base = active().expect("alternate stack active");
            assert_ne!(Some(base), mapped());
            register_thread().expect("second call");
            assert_eq!(active(), Some(base));
            THREAD_STACK.with(|slot| slot.borrow_mut().take());
            assert_ne!(active(), Some(base));
        })
        .join()
        .expect("thread");
    }

    #[test]
    fn usable_size_covers_config() {
        assert!(usable_size() >= ALT_STACK_SIZE);
        assert_eq!(usable_size() % page_size(), 0);
    }
}
