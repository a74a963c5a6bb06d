//! Helper macro for primitive generation.
//!
//! Provides `define_prims!`, which expands each primitive into the exported
//! routine plus its `hlp_` companion and appends it to the `PRIMITIVES` table.

/// Declare every primitive the library ships, in one invocation.
///
/// # Usage
///
/// ```ignore
/// define_prims! {
///     library = "testmath";
///
///     /// Doc comment for the primitive.
///     fn add(a: i32, b: i32) -> i32 = c"ii_i" {
///         a.wrapping_add(b)
///     }
/// }
/// ```
///
/// For a primitive `name` this expands to:
///
/// - `#[unsafe(no_mangle)] pub extern "C" fn name(..)`;
/// - `pub mod name` holding `SIGNATURE`, a compile-time check that the
///   signature literal spells the Rust parameter and return types, the
///   `hlp_name` companion and the `<library>_name` alias.
///
/// The function and the module share a name without clashing because they
/// live in different namespaces.
macro_rules! define_prims {
    (
        library = $lib:literal;
        $(
            $(#[$meta:meta])*
            fn $name:ident( $($arg:ident : $argty:ty),* $(,)? ) -> $ret:ty = $sig:literal
            $body:block
        )+
    ) => {
        $(
            $(#[$meta])*
            #[unsafe(no_mangle)]
            pub extern "C" fn $name( $($arg : $argty),* ) -> $ret
            $body

            #[doc = concat!("Introspection companion and aliases for [`", stringify!($name), "`](fn@", stringify!($name), ").")]
            pub mod $name {
                use std::ffi::{CStr, c_char, c_void};

                use testkit_core::signature::{self, AbiType};

                const LITERAL: &CStr = $sig;

                /// Static signature string handed out by [`hlp`].
                pub static SIGNATURE: &CStr = LITERAL;

                const _: () = assert!(
                    signature::matches_types(
                        LITERAL.to_bytes(),
                        &[$(<$argty as AbiType>::CODE),*],
                        <$ret as AbiType>::CODE,
                    ),
                    concat!("signature does not match the Rust type of ", stringify!($name)),
                );

                /// Library-qualified alias of the primitive.
                #[unsafe(export_name = concat!($lib, "_", stringify!($name)))]
                pub extern "C" fn qualified( $($arg : $argty),* ) -> $ret {
                    super::$name( $($arg),* )
                }

                /// Store the signature into `*sign` (when non-null) and return
                /// the primitive's address.
                ///
                /// # Safety
                ///
                /// `sign` must be null or valid for one pointer-sized write.
                #[unsafe(export_name = concat!("hlp_", stringify!($name)))]
                pub unsafe extern "C" fn hlp(sign: *mut *const c_char) -> *mut c_void {
                    if !sign.is_null() {
                        // SAFETY: caller guarantees a writable out-slot.
                        unsafe { sign.write(SIGNATURE.as_ptr()) };
                    }
                    super::$name as *const () as *mut c_void
                }
            }
        )+

        /// Every primitive exported by this library, in declaration order.
        pub static PRIMITIVES: &[$crate::Primitive] = &[
            $(
                $crate::Primitive {
                    name: stringify!($name),
                    symbol: concat!($lib, "_", stringify!($name)),
                    params: &[$(stringify!($arg)),*],
                    describe: $name::hlp,
                },
            )+
        ];
    };
}

pub(crate) use define_prims;
