//! # testkit-core
//!
//! Safe, allocation-conscious logic shared by the two test-support artifacts:
//!
//! - `seghandler`, the crash diagnostic shim, uses [`signal`], [`state`],
//!   [`report`] and [`config`] to decide what to print and how to exit.
//! - `testmath`, the introspectable fixture library, uses [`signature`] to
//!   check its `hlp_` signature strings and [`arith`] for the primitive bodies.
//!
//! No `unsafe` code is permitted here. Everything that touches raw pointers,
//! signal dispositions or exported symbols lives in the ABI crates.

#![deny(unsafe_code)]

pub mod arith;
pub mod config;
pub mod error;
pub mod report;
pub mod signal;
pub mod signature;
pub mod state;

pub use error::{InstallError, SignatureError};
pub use signal::FatalSignal;
pub use signature::{AbiType, Signature, TypeCode};
pub use state::ShimState;
