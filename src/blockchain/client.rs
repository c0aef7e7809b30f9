// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC client for the Solana cluster hosting the storage program.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{NetworkConfig, Pubkey, Signature};

/// Commitment used for reads and confirmation.
pub const DEFAULT_COMMITMENT: &str = "confirmed";

/// Errors that can occur during RPC calls.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC request timed out: {0}")]
    Timeout(String),

    #[error("RPC transport error: {0}")]
    Transport(String),

    /// JSON-RPC level error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Node {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Timeout(e.to_string())
        } else {
            RpcError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct RpcAccount {
    /// `[base64, "base64"]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct RpcKeyedAccount {
    pubkey: String,
    account: RpcAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
}

/// Status of a submitted transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation_status: Option<String>,
    pub err: Option<Value>,
}

impl SignatureStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }
}

/// A memcmp filter for `getProgramAccounts`.
#[derive(Debug, Clone)]
pub struct MemcmpFilter {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl MemcmpFilter {
    fn to_json(&self) -> Value {
        json!({
            "memcmp": {
                "offset": self.offset,
                "bytes": bs58::encode(&self.bytes).into_string(),
            }
        })
    }
}

/// Thin typed wrapper over the cluster's JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    url: url::Url,
    http: reqwest::Client,
    commitment: &'static str,
}

impl RpcClient {
    /// Create a client for an RPC endpoint.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| RpcError::InvalidRpcUrl(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            http,
            commitment: DEFAULT_COMMITMENT,
        })
    }

    /// Create a client for a known network.
    pub fn for_network(network: &NetworkConfig, timeout: Duration) -> Result<Self, RpcError> {
        Self::new(network.rpc_url, timeout)
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        tracing::debug!(method, "rpc call");

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.http.post(self.url.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RpcError::Transport(format!("HTTP {status}: {text}")));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        envelope
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: missing result")))
    }

    /// Raw account data, or `None` if the account does not exist.
    pub async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let result: WithContext<Option<RpcAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment }
                ]),
            )
            .await?;

        result.value.map(|account| decode_data(&account.data)).transpose()
    }

    /// All accounts owned by `program_id` matching every filter.
    pub async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[MemcmpFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, RpcError> {
        let filters: Vec<Value> = filters.iter().map(MemcmpFilter::to_json).collect();
        let accounts: Vec<RpcKeyedAccount> = self
            .call(
                "getProgramAccounts",
                json!([
                    program_id.to_string(),
                    {
                        "encoding": "base64",
                        "commitment": self.commitment,
                        "filters": filters,
                    }
                ]),
            )
            .await?;

        accounts
            .into_iter()
            .map(|keyed| {
                let pubkey = keyed
                    .pubkey
                    .parse::<Pubkey>()
                    .map_err(|e| RpcError::InvalidResponse(format!("account key: {e}")))?;
                Ok((pubkey, decode_data(&keyed.account.data)?))
            })
            .collect()
    }

    /// Most recent blockhash for transaction building.
    pub async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError> {
        let result: WithContext<RpcBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment }]),
            )
            .await?;

        let bytes = bs58::decode(&result.value.blockhash)
            .into_vec()
            .map_err(|e| RpcError::InvalidResponse(format!("blockhash: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| RpcError::InvalidResponse("blockhash is not 32 bytes".to_string()))
    }

    /// Submit a serialized, signed transaction (with preflight simulation).
    pub async fn send_transaction(&self, wire: &[u8]) -> Result<Signature, RpcError> {
        let encoded = Base64::encode_string(wire);
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    { "encoding": "base64", "preflightCommitment": self.commitment }
                ]),
            )
            .await?;

        signature
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("signature: {e}")))
    }

    /// Current status of a submitted transaction, if the node knows it.
    pub async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let result: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;

        Ok(result.value.into_iter().next().flatten())
    }
}

fn decode_data((payload, encoding): &(String, String)) -> Result<Vec<u8>, RpcError> {
    if encoding != "base64" {
        return Err(RpcError::InvalidResponse(format!(
            "unexpected account encoding {encoding}"
        )));
    }
    Base64::decode_vec(payload)
        .map_err(|e| RpcError::InvalidResponse(format!("account data: {e}")))
}
