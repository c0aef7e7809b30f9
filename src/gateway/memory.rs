// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process content gateway for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use url::Url;

use super::{ipfs_url, ContentGateway, ContentId, GatewayError};

/// Multihash prefix for sha2-256 (code 0x12, length 32).
const SHA256_MULTIHASH_PREFIX: [u8; 2] = [0x12, 0x20];

/// CIDv0 of `bytes`: base58 of the sha2-256 multihash (`Qm…`).
pub fn cid_v0(bytes: &[u8]) -> ContentId {
    let mut multihash = Vec::with_capacity(34);
    multihash.extend_from_slice(&SHA256_MULTIHASH_PREFIX);
    multihash.extend_from_slice(&Sha256::digest(bytes));
    ContentId(bs58::encode(multihash).into_string())
}

/// Gateway that keeps pinned bytes in memory.
pub struct InMemoryGateway {
    gateway_url: Url,
    pinned: RwLock<HashMap<ContentId, Vec<u8>>>,
    failing: AtomicBool,
    latency: Duration,
}

impl InMemoryGateway {
    pub fn new(gateway_url: Url) -> Self {
        Self {
            gateway_url,
            pinned: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// While set, every pin fails with `UploadFailed`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Bytes pinned under `id`, if any.
    pub async fn get(&self, id: &ContentId) -> Option<Vec<u8>> {
        self.pinned.read().await.get(id).cloned()
    }

    pub async fn pinned_count(&self) -> usize {
        self.pinned.read().await.len()
    }
}

impl std::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGateway")
            .field("gateway_url", &self.gateway_url.as_str())
            .finish()
    }
}

#[async_trait]
impl ContentGateway for InMemoryGateway {
    async fn pin(&self, name: &str, bytes: &[u8]) -> Result<ContentId, GatewayError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::UploadFailed(format!(
                "pinning {name} refused by test gateway"
            )));
        }

        let id = cid_v0(bytes);
        self.pinned
            .write()
            .await
            .insert(id.clone(), bytes.to_vec());
        Ok(id)
    }

    fn url_for(&self, id: &ContentId) -> Result<Url, GatewayError> {
        ipfs_url(&self.gateway_url, id)
    }
}
