// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session configuration, observable state and operation results.

use std::time::Duration;

use serde::Serialize;
use url::Url;
use utoipa::ToSchema;

use crate::blockchain::{FileAccount, FileInfo, Pubkey, Signature, StorageInfo};
use crate::content::CONTENT_HASH_HEX_LEN;
use crate::gateway::ContentId;
use crate::projection::StorageStats;

use super::SessionError;

/// 100 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_NAME_LEN: usize = 100;
pub const DEFAULT_MAX_CONTENT_ID_LEN: usize = 100;
pub const DEFAULT_MAX_ENCRYPTION_KEY_LEN: usize = 256;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounds checked before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub max_name_len: usize,
    pub max_hash_len: usize,
    pub max_content_id_len: usize,
    pub max_encryption_key_len: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_hash_len: CONTENT_HASH_HEX_LEN,
            max_content_id_len: DEFAULT_MAX_CONTENT_ID_LEN,
            max_encryption_key_len: DEFAULT_MAX_ENCRYPTION_KEY_LEN,
        }
    }
}

impl UploadLimits {
    pub fn validate(
        &self,
        name: &str,
        size: u64,
        encryption_key: Option<&str>,
    ) -> Result<(), SessionError> {
        if name.trim().is_empty() {
            return Err(SessionError::InvalidInput("file name is empty".to_string()));
        }
        if name.len() > self.max_name_len {
            return Err(SessionError::InvalidInput(format!(
                "file name is {} bytes, limit is {}",
                name.len(),
                self.max_name_len
            )));
        }
        if size == 0 {
            return Err(SessionError::InvalidInput("file is empty".to_string()));
        }
        if size > self.max_file_size {
            return Err(SessionError::InvalidInput(format!(
                "file is {size} bytes, limit is {}",
                self.max_file_size
            )));
        }
        if let Some(key) = encryption_key {
            if key.len() > self.max_encryption_key_len {
                return Err(SessionError::InvalidInput(format!(
                    "encryption key is {} bytes, limit is {}",
                    key.len(),
                    self.max_encryption_key_len
                )));
            }
        }
        Ok(())
    }

    pub fn validate_file_hash(&self, hex: &str) -> Result<(), SessionError> {
        if hex.len() > self.max_hash_len {
            return Err(SessionError::InvalidInput(format!(
                "file hash is {} bytes, limit is {}",
                hex.len(),
                self.max_hash_len
            )));
        }
        Ok(())
    }

    pub fn validate_content_id(&self, id: &ContentId) -> Result<(), SessionError> {
        if id.as_str().len() > self.max_content_id_len {
            return Err(SessionError::InvalidInput(format!(
                "content id is {} bytes, limit is {}",
                id.as_str().len(),
                self.max_content_id_len
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub limits: UploadLimits,
    /// Bound on every ledger and gateway call
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No owner identity
    #[default]
    Disconnected,
    /// Owner known, storage account not (yet) found
    Uninitialized,
    /// Storage account exists
    Ready,
}

/// A file account together with its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FileRecord {
    #[schema(value_type = String)]
    pub address: Pubkey,
    #[serde(flatten)]
    pub account: FileAccount,
}

/// Everything the presentation layer observes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub owner: Option<Pubkey>,
    pub storage_info: Option<StorageInfo>,
    pub files: Vec<FileRecord>,
    /// Operations currently awaiting the ledger or gateway
    pub in_flight: u32,
    /// Connection generation; bumps on every connect and disconnect
    pub epoch: u64,
    /// A mutation committed but the reload after it failed; cleared by the
    /// next successful refresh
    pub stale: bool,
}

impl SessionSnapshot {
    pub fn loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats::project(
            self.files.iter().map(|record| &record.account),
            self.storage_info.as_ref(),
        )
    }
}

/// Result of `initialize_storage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeOutcome {
    Created(Signature),
    AlreadyInitialized,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub address: Pubkey,
    pub file_hash: String,
    pub content_id: ContentId,
    pub url: Url,
    /// `None` when the transaction outcome was lost and the record was found
    /// on the ledger afterwards
    pub signature: Option<Signature>,
    /// Set when the upload had to initialize storage first
    pub initialized: Option<InitializeOutcome>,
}

/// Result of `download_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    pub info: FileInfo,
    pub url: Url,
}
