// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pinata pinning service client.
//!
//! Files are pinned with a multipart `POST {api}/pinning/pinFileToIPFS`
//! authenticated by a bearer JWT, and served from `{gateway}/ipfs/{cid}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{ipfs_url, ContentGateway, ContentId, GatewayError};

pub const DEFAULT_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

const PIN_FILE_PATH: &str = "pinning/pinFileToIPFS";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResponse {
    ipfs_hash: String,
    #[serde(default)]
    pin_size: Option<u64>,
}

/// Pinata client.
#[derive(Clone)]
pub struct PinataGateway {
    http: reqwest::Client,
    api_url: Url,
    gateway_url: Url,
    jwt: String,
}

impl PinataGateway {
    pub fn new(
        jwt: impl Into<String>,
        api_url: &str,
        gateway_url: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let parse = |raw: &str| {
            raw.parse::<Url>()
                .map_err(|e| GatewayError::InvalidUrl(format!("{raw}: {e}")))
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::UploadFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: parse(api_url)?,
            gateway_url: parse(gateway_url)?,
            jwt: jwt.into(),
        })
    }

    fn pin_endpoint(&self) -> String {
        format!("{}/{PIN_FILE_PATH}", self.api_url.as_str().trim_end_matches('/'))
    }
}

impl std::fmt::Debug for PinataGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataGateway")
            .field("api_url", &self.api_url.as_str())
            .field("gateway_url", &self.gateway_url.as_str())
            .field("jwt", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ContentGateway for PinataGateway {
    async fn pin(&self, name: &str, bytes: &[u8]) -> Result<ContentId, GatewayError> {
        let metadata = json!({
            "name": name,
            "keyvalues": { "uploadedAt": Utc::now().to_rfc3339() },
        });
        let options = json!({ "cidVersion": 0 });

        let form = Form::new()
            .part(
                "file",
                Part::bytes(bytes.to_vec())
                    .file_name(name.to_string())
                    .mime_str("application/octet-stream")?,
            )
            .text("pinataMetadata", metadata.to_string())
            .text("pinataOptions", options.to_string());

        tracing::debug!(name, size = bytes.len(), "pinning file");

        let response = self
            .http
            .post(self.pin_endpoint())
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "pinning service rejected upload");
            return Err(GatewayError::UploadFailed(format!("HTTP {status}: {body}")));
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let id = ContentId::new(pinned.ipfs_hash)?;
        tracing::info!(cid = %id, pin_size = ?pinned.pin_size, "file pinned");
        Ok(id)
    }

    fn url_for(&self, id: &ContentId) -> Result<Url, GatewayError> {
        ipfs_url(&self.gateway_url, id)
    }
}
