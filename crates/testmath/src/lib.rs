//! # testmath
//!
//! Loadable test fixture for a host runtime's native-library binding.
//!
//! The `cdylib` exports, for every primitive `P`:
//!
//! - `P` itself with the C calling convention;
//! - `hlp_P(const char **sign) -> void *`, which stores a static signature
//!   string (see [`testkit_core::signature`]) into `*sign` and returns the
//!   address of `P`;
//! - `testmath_P`, the library-qualified alias hosts use when they bind by
//!   `<lib>_<method>` symbol name.
//!
//! A host discovers primitives by resolving `hlp_*` symbols, calling them, and
//! dispatching through the returned address according to the signature.
//!
//! ```text
//! host -> dlsym("hlp_add") -> hlp_add(&sig) -> ("ii_i", &add) -> add(2, 3)
//! ```
//!
//! Rust callers can use the [`PRIMITIVES`] table and [`Primitive::introspect`]
//! instead of raw symbol lookups, and [`manifest`] to produce the JSON
//! manifest form of the same information.

#[macro_use]
mod macros;

pub mod manifest;

use std::ffi::{CStr, c_char, c_void};
use std::ptr::{self, NonNull};

use testkit_core::arith;

pub use manifest::{FunctionDef, Manifest, ManifestError, Param, manifest, manifest_json};

/// Library name used for qualified symbols and the manifest.
pub const LIBRARY_NAME: &str = "testmath";

/// Class name a host binds the primitives under.
pub const CLASS_NAME: &str = "TestMath";

/// C type of every `hlp_` companion.
pub type HlpFn = unsafe extern "C" fn(*mut *const c_char) -> *mut c_void;

/// Registry entry for one exported primitive.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    /// Unqualified symbol name, e.g. `add`.
    pub name: &'static str,
    /// Library-qualified alias, e.g. `testmath_add`.
    pub symbol: &'static str,
    /// Declared parameter names, in order.
    pub params: &'static [&'static str],
    /// The `hlp_` companion.
    pub describe: HlpFn,
}

/// What an `hlp_` call hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Introspection {
    pub signature: &'static CStr,
    pub address: NonNull<c_void>,
}

impl Primitive {
    /// Call the companion and collect the signature and code address.
    ///
    /// Companions always fill the slot and return a non-null address; `None`
    /// would mean the table is out of step with the exports.
    #[must_use]
    pub fn introspect(&self) -> Option<Introspection> {
        let mut sign: *const c_char = ptr::null();
        // SAFETY: `sign` is a valid out-slot for the duration of the call.
        let address = unsafe { (self.describe)(&mut sign) };
        if sign.is_null() {
            return None;
        }
        // SAFETY: companions store pointers to `'static` C string literals.
        let signature: &'static CStr = unsafe { CStr::from_ptr(sign) };
        Some(Introspection {
            signature,
            address: NonNull::new(address)?,
        })
    }

    /// Name of the `hlp_` symbol for this primitive.
    #[must_use]
    pub fn companion_symbol(&self) -> String {
        format!("hlp_{}", self.name)
    }
}

/// Find a primitive by its unqualified name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static Primitive> {
    PRIMITIVES.iter().find(|p| p.name == name)
}

define_prims! {
    library = "testmath";

    /// Wrapping sum of two 32-bit integers.
    fn add(a: i32, b: i32) -> i32 = c"ii_i" {
        arith::add(a, b)
    }

    /// Wrapping product of two 32-bit integers.
    fn multiply(a: i32, b: i32) -> i32 = c"ii_i" {
        arith::multiply(a, b)
    }

    /// Ten-step Newton square root; `0.0` for non-positive input.
    fn sqrt_approx(x: f64) -> f64 = c"d_d" {
        arith::sqrt_approx(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_exports() {
        let names: Vec<_> = PRIMITIVES.iter().map(|p| p.name).collect();
        assert_eq!(names, ["add", "multiply", "sqrt_approx"]);
        assert_eq!(lookup("multiply").map(|p| p.symbol), Some("testmath_multiply"));
        assert!(lookup("divide").is_none());
    }

    #[test]
    fn companion_names() {
        assert_eq!(lookup("add").unwrap().companion_symbol(), "hlp_add");
    }

    #[test]
    fn signatures_are_the_module_constants() {
        let info = lookup("add").unwrap().introspect().unwrap();
        assert_eq!(info.signature, add::SIGNATURE);
        assert_eq!(info.signature.as_ptr(), add::SIGNATURE.as_ptr());
        let sqrt = lookup("sqrt_approx").unwrap().introspect().unwrap();
        assert_eq!(sqrt.signature.to_str(), Ok("d_d"));
    }

    #[test]
    fn hlp_tolerates_null_slot() {
        // SAFETY: null is an accepted out-slot.
        let addr = unsafe { add::hlp(ptr::null_mut()) };
        assert_eq!(addr, add as *const () as *mut c_void);
    }

    #[test]
    fn qualified_alias_forwards() {
        assert_eq!(add::qualified(40, 2), 42);
        assert_eq!(multiply::qualified(-3, 3), -9);
        assert_eq!(sqrt_approx::qualified(-5.0), 0.0);
    }
}
