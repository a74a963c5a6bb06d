//! Signature strings returned by `hlp_` companion symbols.
//!
//! ```text
//! signature   := param-codes "_" return-code
//! param-codes := type-code*
//! type-code   := "i" | "d" | "v" | "b" | "B"
//! ```
//!
//! `v` may only appear as the return code. The `const fn` checkers let the
//! fixture library reject a mismatched signature literal at compile time.

use std::fmt;
use std::str::FromStr;

use crate::error::SignatureError;

/// Separator between parameter codes and the return code.
pub const SEPARATOR: u8 = b'_';

/// One character of a signature string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCode {
    /// 32-bit signed integer.
    Int = b'i',
    /// 64-bit IEEE-754 float.
    Float = b'd',
    /// No value; return position only.
    Void = b'v',
    /// One byte, 0 or 1.
    Bool = b'b',
    /// Opaque byte buffer pointer.
    Bytes = b'B',
}

impl TypeCode {
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'i' => Some(Self::Int),
            b'd' => Some(Self::Float),
            b'v' => Some(Self::Void),
            b'b' => Some(Self::Bool),
            b'B' => Some(Self::Bytes),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_char(self) -> char {
        self as u8 as char
    }

    /// Type name used in host-side JSON manifests.
    #[must_use]
    pub const fn manifest_name(self) -> &'static str {
        match self {
            Self::Int => "i32",
            Self::Float => "f64",
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
        }
    }

    #[must_use]
    pub const fn is_valid_param(self) -> bool {
        !matches!(self, Self::Void)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Rust scalar types that may cross the fixture boundary.
pub trait AbiType {
    const CODE: TypeCode;
}

impl AbiType for i32 {
    const CODE: TypeCode = TypeCode::Int;
}

impl AbiType for f64 {
    const CODE: TypeCode = TypeCode::Float;
}

impl AbiType for () {
    const CODE: TypeCode = TypeCode::Void;
}

impl AbiType for bool {
    const CODE: TypeCode = TypeCode::Bool;
}

impl AbiType for *mut u8 {
    const CODE: TypeCode = TypeCode::Bytes;
}

impl AbiType for *const u8 {
    const CODE: TypeCode = TypeCode::Bytes;
}

/// Parsed signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<TypeCode>,
    pub ret: TypeCode,
}

impl Signature {
    #[must_use]
    pub fn new(params: Vec<TypeCode>, ret: TypeCode) -> Self {
        Self { params, ret }
    }

    /// Parse raw bytes, e.g. the contents of a C string without its NUL.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, SignatureError> {
        if raw.is_empty() {
            return Err(SignatureError::Empty);
        }
        let sep = raw
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or(SignatureError::MissingSeparator)?;

        let params = raw[..sep]
            .iter()
            .enumerate()
            .map(|(offset, &b)| match TypeCode::from_byte(b) {
                Some(TypeCode::Void) => Err(SignatureError::VoidParameter { offset }),
                Some(code) => Ok(code),
                None => Err(SignatureError::UnknownCode {
                    code: char::from(b),
                    offset,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tail = &raw[sep + 1..];
        let (&first, rest) = tail.split_first().ok_or(SignatureError::MissingReturn)?;
        let ret = TypeCode::from_byte(first).ok_or(SignatureError::UnknownCode {
            code: char::from(first),
            offset: sep + 1,
        })?;
        if !rest.is_empty() {
            return Err(SignatureError::TrailingCodes { extra: rest.len() });
        }

        Ok(Self { params, ret })
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_bytes(s.as_bytes())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.params {
            write!(f, "{p}")?;
        }
        write!(f, "_{}", self.ret)
    }
}

// ---------------------------------------------------------------------------
// Compile-time checks
// ---------------------------------------------------------------------------

/// `const` version of [`Signature::parse_bytes`] that only answers yes/no.
#[must_use]
pub const fn is_well_formed(raw: &[u8]) -> bool {
    let mut i = 0;
    while i < raw.len() && raw[i] != SEPARATOR {
        match TypeCode::from_byte(raw[i]) {
            Some(code) if code.is_valid_param() => {}
            _ => return false,
        }
        i += 1;
    }
    // exactly one return code after the separator
    if i + 2 != raw.len() {
        return false;
    }
    TypeCode::from_byte(raw[i + 1]).is_some()
}

/// True when `raw` is well formed and spells exactly `params` then `ret`.
#[must_use]
pub const fn matches_types(raw: &[u8], params: &[TypeCode], ret: TypeCode) -> bool {
    if !is_well_formed(raw) || raw.len() != params.len() + 2 {
        return false;
    }
    let mut i = 0;
    while i < params.len() {
        if raw[i] != params[i].as_byte() {
            return false;
        }
        i += 1;
    }
    raw[params.len()] == SEPARATOR && raw[params.len() + 1] == ret.as_byte()
}
