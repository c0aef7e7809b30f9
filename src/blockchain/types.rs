// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger types and constants.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Program id declared by the dcloud storage program.
pub const DEFAULT_PROGRAM_ID: &str = "2DWNrUtJXqnA9qu444yyACg2VXnXmEqwBPG7Q7cgM1NM";

/// Bytes allocated for a storage account (discriminator included).
pub const STORAGE_ACCOUNT_SPACE: usize = 8 + 32 + 4 + 8 + 1;

/// Bytes allocated for a file account (discriminator included).
pub const FILE_ACCOUNT_SPACE: usize =
    8 + 32 + 4 + 64 + 4 + 100 + 8 + 4 + 100 + 1 + 4 + 256 + 8 + 1 + 8 + 1;

/// The system program (all-zero key).
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

// =============================================================================
// Keys and signatures
// =============================================================================

/// A 32-byte ledger public key, rendered as base58.
///
/// Used both for owner identities (wallet keys) and for derived account
/// addresses.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

/// Error parsing a base58 key or signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseKeyError {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

fn decode_base58<const N: usize>(s: &str) -> Result<[u8; N], ParseKeyError> {
    let bytes = bs58::decode(s.trim())
        .into_vec()
        .map_err(|e| ParseKeyError::InvalidBase58(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| ParseKeyError::WrongLength {
        expected: N,
        actual,
    })
}

impl FromStr for Pubkey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58::<32>(s).map(Self)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A 64-byte transaction signature, rendered as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58::<64>(s).map(Self)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// =============================================================================
// Network configuration
// =============================================================================

/// Solana cluster configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Cluster query parameter used by the explorer
    pub cluster: &'static str,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

impl NetworkConfig {
    /// Look up a network by its short name (`mainnet`, `devnet`, ...).
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Some(SOLANA_MAINNET),
            "devnet" => Some(SOLANA_DEVNET),
            "testnet" => Some(SOLANA_TESTNET),
            "localnet" | "localhost" => Some(SOLANA_LOCALNET),
            _ => None,
        }
    }

    /// Explorer link for a transaction signature.
    pub fn explorer_tx_url(&self, signature: &Signature) -> String {
        format!(
            "{}/tx/{}?cluster={}",
            self.explorer_url, signature, self.cluster
        )
    }
}

pub const SOLANA_MAINNET: NetworkConfig = NetworkConfig {
    name: "Solana Mainnet Beta",
    cluster: "mainnet-beta",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://explorer.solana.com",
};

pub const SOLANA_DEVNET: NetworkConfig = NetworkConfig {
    name: "Solana Devnet",
    cluster: "devnet",
    rpc_url: "https://api.devnet.solana.com",
    explorer_url: "https://explorer.solana.com",
};

pub const SOLANA_TESTNET: NetworkConfig = NetworkConfig {
    name: "Solana Testnet",
    cluster: "testnet",
    rpc_url: "https://api.testnet.solana.com",
    explorer_url: "https://explorer.solana.com",
};

pub const SOLANA_LOCALNET: NetworkConfig = NetworkConfig {
    name: "Local Validator",
    cluster: "custom",
    rpc_url: "http://localhost:8899",
    explorer_url: "https://explorer.solana.com",
};

// =============================================================================
// Program accounts
// =============================================================================

/// Per-owner aggregate account held by the storage program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StorageAccount {
    #[schema(value_type = String)]
    pub owner: Pubkey,
    pub total_files: u32,
    pub total_storage_used: u64,
    pub bump: u8,
}

/// Per-file account held by the storage program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileAccount {
    #[schema(value_type = String)]
    pub owner: Pubkey,
    /// Hex SHA-256 of the file bytes
    pub file_hash: String,
    pub file_name: String,
    pub file_size: u64,
    /// Content identifier on IPFS
    pub ipfs_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    /// Unix seconds
    pub upload_timestamp: i64,
    pub is_public: bool,
    pub access_count: u64,
    pub bump: u8,
}

impl FileAccount {
    pub fn info(&self) -> FileInfo {
        FileInfo {
            owner: self.owner,
            file_hash: self.file_hash.clone(),
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            ipfs_hash: self.ipfs_hash.clone(),
            upload_timestamp: self.upload_timestamp,
            is_public: self.is_public,
            access_count: self.access_count,
        }
    }
}

/// View returned by the `download_file` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileInfo {
    #[schema(value_type = String)]
    pub owner: Pubkey,
    pub file_hash: String,
    pub file_name: String,
    pub file_size: u64,
    pub ipfs_hash: String,
    pub upload_timestamp: i64,
    pub is_public: bool,
    pub access_count: u64,
}

/// View returned by the `get_storage_info` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StorageInfo {
    #[schema(value_type = String)]
    pub owner: Pubkey,
    pub total_files: u32,
    pub total_storage_used: u64,
}

impl From<&StorageAccount> for StorageInfo {
    fn from(account: &StorageAccount) -> Self {
        Self {
            owner: account.owner,
            total_files: account.total_files,
            total_storage_used: account.total_storage_used,
        }
    }
}

/// Arguments of the `upload_file` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileArgs {
    pub file_hash: String,
    pub file_name: String,
    pub file_size: u64,
    pub ipfs_hash: String,
    pub encryption_key: Option<String>,
}
