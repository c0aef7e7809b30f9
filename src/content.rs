// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content hashing for uploaded files.
//!
//! The content hash is the SHA-256 digest of the raw file bytes. It is the
//! dedup key for a file and the discriminator seed of its ledger address, so
//! it must be a pure function of the bytes: no randomness, no timestamps.

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Length of a hex-encoded content hash.
pub const CONTENT_HASH_HEX_LEN: usize = 64;

/// SHA-256 digest of a file's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Raw digest bytes, used as a derivation seed.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != CONTENT_HASH_HEX_LEN {
            return Err(HashError::InvalidEncoding(format!(
                "expected {CONTENT_HASH_HEX_LEN} hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| HashError::InvalidEncoding(e.to_string()))?;
        Ok(Self(bytes))
    }
}

/// Errors raised while hashing content.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to read content: {0}")]
    Read(#[from] io::Error),

    #[error("invalid content hash: {0}")]
    InvalidEncoding(String),

    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
}

/// Hash an in-memory byte slice.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash(Sha256::digest(bytes).into())
}

/// Read a file of at most `max_len` bytes from disk and hash it.
///
/// The size is checked from metadata before anything is read.
pub async fn hash_file(
    path: impl AsRef<Path>,
    max_len: u64,
) -> Result<(ContentHash, Vec<u8>), HashError> {
    let path = path.as_ref();
    let size = tokio::fs::metadata(path).await?.len();
    if size > max_len {
        return Err(HashError::TooLarge {
            size,
            limit: max_len,
        });
    }
    let bytes = tokio::fs::read(path).await?;
    Ok((hash_bytes(&bytes), bytes))
}
