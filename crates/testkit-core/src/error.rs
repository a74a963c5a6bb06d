//! Error types shared by the shim installer and the signature parser.

use thiserror::Error;

use crate::signal::FatalSignal;

/// Why the crash shim could not arm itself.
///
/// Always reported and then swallowed: a failed install leaves the host
/// running without protection. `Copy` so it can be built and rendered without
/// touching the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("alternate stack allocation of {size} bytes failed (errno {errno})")]
    AltStackAlloc { size: usize, errno: i32 },
    #[error("alternate stack guard page setup failed (errno {errno})")]
    GuardPage { errno: i32 },
    #[error("sigaltstack registration failed (errno {errno})")]
    AltStackRegister { errno: i32 },
    #[error("sigaction({signal}) failed (errno {errno})")]
    Handler { signal: FatalSignal, errno: i32 },
}

impl InstallError {
    /// Host errno carried by the error.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match *self {
            Self::AltStackAlloc { errno, .. }
            | Self::GuardPage { errno }
            | Self::AltStackRegister { errno }
            | Self::Handler { errno, .. } => errno,
        }
    }
}

/// A signature string that does not follow `param-codes "_" return-code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature is empty")]
    Empty,
    #[error("signature has no '_' separator")]
    MissingSeparator,
    #[error("unknown type code {code:?} at offset {offset}")]
    UnknownCode { code: char, offset: usize },
    #[error("'v' is only valid as a return code (offset {offset})")]
    VoidParameter { offset: usize },
    #[error("signature has no return code after '_'")]
    MissingReturn,
    #[error("{extra} extra code(s) after the return code")]
    TrailingCodes { extra: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_error_messages_name_the_failure() {
        let e = InstallError::Handler {
            signal: FatalSignal::Bus,
            errno: 22,
        };
        assert_eq!(e.to_string(), "sigaction(SIGBUS) failed (errno 22)");
        assert_eq!(e.errno(), 22);

        let e = InstallError::AltStackAlloc {
            size: 69632,
            errno: 12,
        };
        assert!(e.to_string().contains("69632 bytes"));
        assert_eq!(e.errno(), 12);
    }

    #[test]
    fn signature_error_messages() {
        let e = SignatureError::UnknownCode {
            code: 'x',
            offset: 1,
        };
        assert_eq!(e.to_string(), "unknown type code 'x' at offset 1");
        assert_eq!(
            SignatureError::TrailingCodes { extra: 2 }.to_string(),
            "2 extra code(s) after the return code"
        );
    }
}
