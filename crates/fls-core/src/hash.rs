//! SHA-256 digest helper used as the transport-level integrity trailer.
//!
//! The digest is always exactly 32 bytes and is deterministic: two calls
//! on identical input produce identical bytes. Unlike the
//! original GSE tool, a hashing failure here is surfaced as a hard error
//! rather than papered over with a zero-filled placeholder — see the
//! open-question resolution in DESIGN.md.

use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

pub const DIGEST_LEN: usize = 32;

/// Compute the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> Result<[u8; DIGEST_LEN]> {
    let digest = Sha256::digest(data);
    digest
        .as_slice()
        .try_into()
        .map_err(|_| CoreError::Hash("digest output was not 32 bytes".to_string()))
}
