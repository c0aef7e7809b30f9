// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session errors.

use crate::blockchain::{AddressError, LedgerError};
use crate::content::HashError;
use crate::gateway::GatewayError;

/// Error type surfaced by every session operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No owner identity is connected
    #[error("no wallet connected")]
    NotConnected,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to hash file: {0}")]
    HashingFailed(String),

    /// Content gateway failure
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Ledger transport or rejection
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The connection changed while the operation was in flight
    #[error("operation cancelled: wallet disconnected")]
    Cancelled,
}

impl SessionError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::NotConnected => "not_connected",
            SessionError::InvalidInput(_) => "invalid_input",
            SessionError::HashingFailed(_) => "hashing_failed",
            SessionError::UploadFailed(_) => "upload_failed",
            SessionError::RequestFailed(_) => "request_failed",
            SessionError::Timeout(_) => "timeout",
            SessionError::AlreadyExists(_) => "already_exists",
            SessionError::PermissionDenied(_) => "permission_denied",
            SessionError::NotFound(_) => "not_found",
            SessionError::Cancelled => "cancelled",
        }
    }

    /// Whether the ledger may or may not have applied the request.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout(_) | SessionError::RequestFailed(_)
        )
    }
}

impl From<HashError> for SessionError {
    fn from(e: HashError) -> Self {
        match e {
            e @ HashError::TooLarge { .. } => SessionError::InvalidInput(e.to_string()),
            other => SessionError::HashingFailed(other.to_string()),
        }
    }
}

impl From<AddressError> for SessionError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::MissingOwner => SessionError::NotConnected,
            other => SessionError::InvalidInput(other.to_string()),
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout(msg) => SessionError::Timeout(msg),
            GatewayError::InvalidUrl(msg) => SessionError::RequestFailed(msg),
            other => SessionError::UploadFailed(other.to_string()),
        }
    }
}

impl From<LedgerError> for SessionError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidInput(msg) => SessionError::InvalidInput(msg),
            LedgerError::AlreadyExists(msg) => SessionError::AlreadyExists(msg),
            LedgerError::PermissionDenied(msg) => SessionError::PermissionDenied(msg),
            LedgerError::NotFound(msg) => SessionError::NotFound(msg),
            LedgerError::Timeout(msg) => SessionError::Timeout(msg),
            e @ LedgerError::SignerMismatch { .. } => SessionError::PermissionDenied(e.to_string()),
            other => SessionError::RequestFailed(other.to_string()),
        }
    }
}
