// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content-addressed storage gateway.
//!
//! File bytes are pinned to IPFS through a pinning service; the ledger only
//! records the returned content identifier. Gateways send bytes unmodified
//! and never retry.

pub mod memory;
pub mod pinata;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub use memory::InMemoryGateway;
pub use pinata::PinataGateway;

/// Identifier returned by the content network for pinned bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Accepts any non-empty alphanumeric identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, GatewayError> {
        let raw = raw.into();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GatewayError::InvalidContentId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors returned by content gateways.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("gateway request timed out: {0}")]
    Timeout(String),

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("invalid content identifier: {0:?}")]
    InvalidContentId(String),

    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout(e.to_string())
        } else {
            GatewayError::UploadFailed(e.to_string())
        }
    }
}

/// A content-addressed storage network.
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Pin `bytes` under a display `name` and return their content id.
    async fn pin(&self, name: &str, bytes: &[u8]) -> Result<ContentId, GatewayError>;

    /// Public retrieval link for a content id.
    fn url_for(&self, id: &ContentId) -> Result<Url, GatewayError>;
}

/// `{base}/ipfs/{cid}`
pub(crate) fn ipfs_url(base: &Url, id: &ContentId) -> Result<Url, GatewayError> {
    let raw = format!("{}/ipfs/{}", base.as_str().trim_end_matches('/'), id);
    raw.parse()
        .map_err(|e: url::ParseError| GatewayError::InvalidUrl(e.to_string()))
}
