// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the local bridge. Everything derives
//! `ToSchema` for the OpenAPI document served at `/docs`.
//!
//! ## Model Categories
//!
//! - **Session**: connection state and the derived statistics
//! - **Storage**: the owner's aggregate account
//! - **Files**: upload receipts, share and download results

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::blockchain::{FileInfo, NetworkConfig, Pubkey, Signature, StorageInfo};
use crate::projection::{format_bytes, StorageStats};
use crate::session::{
    DownloadTicket, FileRecord, InitializeOutcome, SessionSnapshot, SessionState, UploadReceipt,
};

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConnectRequest {
    /// Base58 owner public key
    #[schema(value_type = String, example = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T")]
    pub owner: Pubkey,
}

/// Full view of the session as the web UI renders it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub state: SessionState,
    #[schema(value_type = Option<String>)]
    pub owner: Option<Pubkey>,
    pub initialized: bool,
    pub loading: bool,
    pub storage_info: Option<StorageInfo>,
    pub stats: StorageStats,
    /// `stats.total_bytes` rendered for display
    pub total_size: String,
    pub files: Vec<FileRecord>,
    /// The last mutation committed but the view could not be reloaded
    pub stale: bool,
}

impl From<SessionSnapshot> for SessionResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        let stats = snapshot.stats();
        Self {
            state: snapshot.state,
            owner: snapshot.owner,
            initialized: snapshot.is_initialized(),
            loading: snapshot.loading(),
            storage_info: snapshot.storage_info,
            stats,
            total_size: format_bytes(stats.total_bytes),
            files: snapshot.files,
            stale: snapshot.stale,
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InitializeResponse {
    /// False when the account already existed
    pub created: bool,
    #[schema(value_type = Option<String>)]
    pub signature: Option<Signature>,
}

impl From<InitializeOutcome> for InitializeResponse {
    fn from(outcome: InitializeOutcome) -> Self {
        match outcome {
            InitializeOutcome::Created(signature) => Self {
                created: true,
                signature: Some(signature),
            },
            InitializeOutcome::AlreadyInitialized => Self {
                created: false,
                signature: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StorageResponse {
    pub storage_info: Option<StorageInfo>,
    pub stats: StorageStats,
    pub total_size: String,
}

// =============================================================================
// Files
// =============================================================================

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Display name stored on the ledger
    pub name: String,
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadResponse {
    #[schema(value_type = String)]
    pub address: Pubkey,
    pub file_hash: String,
    pub ipfs_hash: String,
    pub url: String,
    /// Absent when the record was confirmed without a transaction response
    #[schema(value_type = Option<String>)]
    pub signature: Option<Signature>,
    pub explorer_url: Option<String>,
    /// Set when storage had to be initialized first
    pub initialized: Option<InitializeResponse>,
}

impl UploadResponse {
    pub fn new(receipt: UploadReceipt, network: &NetworkConfig) -> Self {
        Self {
            address: receipt.address,
            file_hash: receipt.file_hash,
            ipfs_hash: receipt.content_id.into_string(),
            url: receipt.url.to_string(),
            explorer_url: receipt.signature.as_ref().map(|s| network.explorer_tx_url(s)),
            signature: receipt.signature,
            initialized: receipt.initialized.map(InitializeResponse::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShareRequest {
    pub is_public: bool,
}

/// Signature of a confirmed mutation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignatureResponse {
    #[schema(value_type = String)]
    pub signature: Signature,
    /// Block explorer page for the transaction
    pub explorer_url: String,
}

impl SignatureResponse {
    pub fn new(signature: Signature, network: &NetworkConfig) -> Self {
        Self {
            explorer_url: network.explorer_tx_url(&signature),
            signature,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DownloadResponse {
    pub info: FileInfo,
    pub url: String,
}

impl From<DownloadTicket> for DownloadResponse {
    fn from(ticket: DownloadTicket) -> Self {
        Self {
            info: ticket.info,
            url: ticket.url.to_string(),
        }
    }
}
