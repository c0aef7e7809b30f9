// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction signing.
//!
//! The session never sees key material: mutating ledger calls go through a
//! [`TransactionSigner`]. The bundled implementation loads a local keypair
//! file in the usual Solana CLI format (a JSON array of 64 bytes: secret key
//! followed by public key).

use std::path::Path;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use super::types::{Pubkey, Signature};

/// Errors loading or using a keypair.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("failed to read keypair file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid keypair file: {0}")]
    InvalidFormat(String),

    #[error("invalid keypair: {0}")]
    InvalidKey(String),
}

/// Something that can sign serialized transaction messages.
pub trait TransactionSigner: Send + Sync {
    /// Public key of the signer (the owner identity).
    fn pubkey(&self) -> Pubkey;

    /// Sign a serialized message.
    fn sign_message(&self, message: &[u8]) -> Signature;
}

/// Ed25519 keypair held in process memory.
pub struct LocalKeypair {
    signing_key: SigningKey,
}

impl LocalKeypair {
    /// Build a keypair from a 32-byte secret.
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Build a keypair from 64 bytes (secret ‖ public), checking they match.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        let bytes: &[u8; 64] = bytes.try_into().map_err(|_| {
            SigningError::InvalidFormat(format!("expected 64 bytes, got {}", bytes.len()))
        })?;
        let signing_key = SigningKey::from_keypair_bytes(bytes)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Parse the JSON array form (`[12, 34, ...]`).
    pub fn from_json(raw: &str) -> Result<Self, SigningError> {
        let bytes: Vec<u8> = serde_json::from_str(raw)
            .map_err(|e| SigningError::InvalidFormat(e.to_string()))?;
        Self::from_keypair_bytes(&bytes)
    }

    /// Load a keypair file from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SigningError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    /// JSON array form, as written by the Solana CLI.
    pub fn to_json(&self) -> String {
        let bytes = self.signing_key.to_keypair_bytes();
        serde_json::Value::from(bytes.to_vec()).to_string()
    }

    /// Check a signature made by this keypair.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        self.verifying_key().verify(message, &sig).is_ok()
    }

    fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl std::fmt::Debug for LocalKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeypair")
            .field("pubkey", &self.pubkey())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TransactionSigner for LocalKeypair {
    fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.verifying_key().to_bytes())
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }
}
