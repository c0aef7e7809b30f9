// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use url::Url;

use crate::blockchain::{
    InMemoryLedger, Ledger, LocalKeypair, NetworkConfig, Pubkey, RpcClient, RpcError, RpcLedger,
    SigningError, SOLANA_DEVNET,
};
use crate::config::{Config, GatewayBackend, LedgerBackend};
use crate::gateway::{ContentGateway, GatewayError, InMemoryGateway, PinataGateway};
use crate::session::{SessionConfig, StorageSession};

/// Failures while wiring the session from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load keypair: {0}")]
    Keypair(#[from] SigningError),

    #[error("failed to create RPC client: {0}")]
    Rpc(#[from] RpcError),

    #[error("failed to create content gateway: {0}")]
    Gateway(#[from] GatewayError),
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<StorageSession>,
    pub network: NetworkConfig,
    /// Owner whose key signs ledger transactions, when signing locally
    pub signer: Option<Pubkey>,
}

impl AppState {
    pub fn new(session: StorageSession, network: NetworkConfig) -> Self {
        Self {
            session: Arc::new(session),
            network,
            signer: None,
        }
    }

    /// State backed by the in-memory ledger and gateway.
    pub fn in_memory(program_id: Pubkey, gateway_url: Url, config: SessionConfig) -> Self {
        let session = StorageSession::new(
            Arc::new(InMemoryLedger::new(program_id)),
            Arc::new(InMemoryGateway::new(gateway_url)),
            config,
        );
        Self::new(session, SOLANA_DEVNET)
    }

    /// Build the ledger and gateway selected by `config`.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let mut signer = None;
        let ledger: Arc<dyn Ledger> = match &config.ledger {
            LedgerBackend::Rpc { keypair_path } => {
                let keypair = LocalKeypair::from_json_file(keypair_path)?;
                let rpc = RpcClient::new(&config.rpc_url, config.session.request_timeout)?;
                let rpc_url = rpc.url().clone();
                let ledger = RpcLedger::new(rpc, config.program_id, Arc::new(keypair));
                signer = Some(ledger.signer_pubkey());
                tracing::info!(
                    rpc_url = %rpc_url,
                    program_id = %config.program_id,
                    signer = %ledger.signer_pubkey(),
                    "using JSON-RPC ledger"
                );
                Arc::new(ledger)
            }
            LedgerBackend::Memory => {
                tracing::warn!("using in-memory ledger; records are lost on exit");
                Arc::new(InMemoryLedger::new(config.program_id))
            }
        };

        let gateway: Arc<dyn ContentGateway> = match &config.gateway {
            GatewayBackend::Pinata {
                jwt,
                api_url,
                gateway_url,
            } => Arc::new(PinataGateway::new(
                jwt.clone(),
                api_url.as_str(),
                gateway_url.as_str(),
                config.session.request_timeout,
            )?),
            GatewayBackend::Memory { gateway_url } => {
                tracing::warn!("using in-memory content gateway");
                Arc::new(InMemoryGateway::new(gateway_url.clone()))
            }
        };

        let session = StorageSession::new(ledger, gateway, config.session);
        Ok(Self {
            signer,
            ..Self::new(session, config.network.clone())
        })
    }
}
