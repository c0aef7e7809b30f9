// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The ledger surface consumed by the storage session.
//!
//! A [`Ledger`] is the system of record for storage accounting. Mutating calls
//! are signed by the ledger implementation on behalf of `owner`; a ledger that
//! cannot sign for `owner` must reject the call with
//! [`LedgerError::SignerMismatch`].

use async_trait::async_trait;
use serde_json::Value;

use super::client::RpcError;
use super::program::ProgramError;
use super::types::{FileAccount, FileInfo, Pubkey, Signature, StorageAccount, StorageInfo, UploadFileArgs};

/// Program error codes of the storage program.
pub mod codes {
    pub const FILE_HASH_TOO_LONG: u32 = 6000;
    pub const FILE_NAME_TOO_LONG: u32 = 6001;
    pub const IPFS_HASH_TOO_LONG: u32 = 6002;
    pub const INVALID_FILE_SIZE: u32 = 6003;
    pub const UNAUTHORIZED_ACCESS: u32 = 6004;

    /// System program: account already in use.
    pub const ACCOUNT_ALREADY_IN_USE: u32 = 0;

    /// Framework constraint violations (seeds, has_one, ...).
    pub const CONSTRAINT_RANGE: std::ops::Range<u32> = 2000..3000;
    pub const ACCOUNT_DISCRIMINATOR_NOT_FOUND: u32 = 3001;
    pub const ACCOUNT_NOT_INITIALIZED: u32 = 3012;
}

/// Errors returned by ledger calls.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("account already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("ledger request timed out: {0}")]
    Timeout(String),

    #[error("ledger request failed: {0}")]
    Request(String),

    /// The transaction reached the ledger and failed for an unmapped reason.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("ledger signs for {actual}, not {expected}")]
    SignerMismatch { expected: Pubkey, actual: Pubkey },
}

impl From<RpcError> for LedgerError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Timeout(msg) => LedgerError::Timeout(msg),
            RpcError::Node {
                code,
                message,
                data,
            } => data
                .as_ref()
                .and_then(classify_transaction_error)
                .unwrap_or_else(|| LedgerError::Request(format!("RPC error {code}: {message}"))),
            RpcError::InvalidResponse(msg) => LedgerError::InvalidResponse(msg),
            other => LedgerError::Request(other.to_string()),
        }
    }
}

impl From<ProgramError> for LedgerError {
    fn from(e: ProgramError) -> Self {
        LedgerError::InvalidResponse(e.to_string())
    }
}

/// Map a transaction failure (preflight `data` or confirmed `err`) to a typed
/// error. Returns `None` when the value carries no recognizable failure.
pub fn classify_transaction_error(value: &Value) -> Option<LedgerError> {
    let logs: Vec<&str> = value
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| logs.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let log_text = logs.join("\n");

    if log_text.contains("already in use") {
        return Some(LedgerError::AlreadyExists(last_line(&logs)));
    }

    let err = value.get("err").unwrap_or(value);

    if err.as_str() == Some("AccountNotFound") {
        return Some(LedgerError::NotFound("account not found".to_string()));
    }

    let Some(code) = custom_code(err) else {
        return (!err.is_null()).then(|| LedgerError::Rejected(err.to_string()));
    };

    let detail = if logs.is_empty() {
        format!("custom program error {code}")
    } else {
        last_line(&logs)
    };

    Some(match code {
        codes::ACCOUNT_ALREADY_IN_USE => LedgerError::AlreadyExists(detail),
        codes::FILE_HASH_TOO_LONG..=codes::INVALID_FILE_SIZE => LedgerError::InvalidInput(detail),
        codes::UNAUTHORIZED_ACCESS => LedgerError::PermissionDenied(detail),
        c if codes::CONSTRAINT_RANGE.contains(&c) => LedgerError::PermissionDenied(detail),
        codes::ACCOUNT_DISCRIMINATOR_NOT_FOUND | codes::ACCOUNT_NOT_INITIALIZED => {
            LedgerError::NotFound(detail)
        }
        _ => LedgerError::Rejected(detail),
    })
}

/// `{"InstructionError": [idx, {"Custom": n}]}` ⇒ `n`
fn custom_code(err: &Value) -> Option<u32> {
    err.get("InstructionError")?
        .get(1)?
        .get("Custom")?
        .as_u64()
        .and_then(|c| u32::try_from(c).ok())
}

fn last_line(logs: &[&str]) -> String {
    logs.last().map(|l| l.to_string()).unwrap_or_default()
}

/// Remote ledger holding storage and file accounts.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Program the accounts belong to.
    fn program_id(&self) -> Pubkey;

    /// Create the owner's storage account at `storage`.
    async fn initialize_storage(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
    ) -> Result<Signature, LedgerError>;

    /// Create a file record at `file` and update the owner's totals.
    async fn upload_file(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
        file: &Pubkey,
        args: &UploadFileArgs,
    ) -> Result<Signature, LedgerError>;

    /// Close the file record and decrement the owner's totals.
    async fn delete_file(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
        file: &Pubkey,
    ) -> Result<Signature, LedgerError>;

    /// Set the visibility flag of a file record.
    async fn share_file(
        &self,
        owner: &Pubkey,
        file: &Pubkey,
        is_public: bool,
    ) -> Result<Signature, LedgerError>;

    /// Record an access and return the updated file view.
    async fn download_file(
        &self,
        owner: &Pubkey,
        file: &Pubkey,
        file_hash: &str,
    ) -> Result<FileInfo, LedgerError>;

    async fn fetch_storage_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<StorageAccount>, LedgerError>;

    async fn fetch_file_account(&self, address: &Pubkey)
        -> Result<Option<FileAccount>, LedgerError>;

    /// File records whose stored owner is `owner`.
    async fn list_file_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<(Pubkey, FileAccount)>, LedgerError>;

    /// Aggregates of the storage account at `storage`.
    async fn get_storage_info(&self, storage: &Pubkey) -> Result<StorageInfo, LedgerError> {
        self.fetch_storage_account(storage)
            .await?
            .map(|account| StorageInfo::from(&account))
            .ok_or_else(|| LedgerError::NotFound(format!("storage account {storage}")))
    }
}
