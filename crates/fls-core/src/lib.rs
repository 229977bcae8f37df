//! Frame codec and digest helper shared by the TFTP endpoint and the
//! ARINC 615A session state machine (component C1).
//!
//! This crate has no I/O and no async runtime — it only builds and
//! parses byte layouts and never panics on malformed input.

pub mod error;
pub mod frame;
pub mod hash;

pub use error::{CoreError, Result};
pub use frame::{ArincStatus, LuiRecord, LurRecord, LusRecord, build_lui, build_lur, build_lus, parse_lui, parse_lur, parse_lus};
pub use hash::{DIGEST_LEN, sha256};
