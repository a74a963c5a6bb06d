//! Loader constructor.
//!
//! Places [`install_at_load`] in the platform's initializer table so that
//! loading the shared object (`LD_PRELOAD`, `DYLD_INSERT_LIBRARIES`, `dlopen`
//! or ordinary linking) arms the shim before `main`.
//!
//! Statics in an rlib may be discarded by the linker when nothing references
//! their object file; Rust binaries linking the rlib should call
//! [`crate::install`] themselves. It is idempotent.

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
))]
#[used]
#[unsafe(link_section = ".init_array")]
static INIT_ARRAY_ENTRY: extern "C" fn() = install_at_load;

#[cfg(target_vendor = "apple")]
#[used]
#[unsafe(link_section = "__DATA,__mod_init_func")]
static MOD_INIT_ENTRY: extern "C" fn() = install_at_load;

extern "C" fn install_at_load() {
    // Failures are already reported on stderr; the host must keep running.
    let _ = crate::install();
}
