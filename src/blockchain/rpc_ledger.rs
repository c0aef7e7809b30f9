// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`Ledger`] backed by a Solana JSON-RPC node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{MemcmpFilter, RpcClient};
use super::ledger::{classify_transaction_error, Ledger, LedgerError};
use super::program::{build_instruction, file_account_discriminator, InstructionAccounts, StorageInstruction};
use super::signing::TransactionSigner;
use super::transactions::Transaction;
use super::types::{FileAccount, FileInfo, Pubkey, Signature, StorageAccount, UploadFileArgs};

/// Default bound on waiting for a submitted transaction to confirm.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Byte offset of the owner key inside a file account.
const FILE_OWNER_OFFSET: usize = 8;

/// Ledger client that signs with a local signer and submits over JSON-RPC.
pub struct RpcLedger {
    rpc: RpcClient,
    program_id: Pubkey,
    signer: Arc<dyn TransactionSigner>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(rpc: RpcClient, program_id: Pubkey, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            rpc,
            program_id,
            signer,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Identity this ledger signs for.
    pub fn signer_pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }

    fn ensure_signer(&self, owner: &Pubkey) -> Result<(), LedgerError> {
        let actual = self.signer.pubkey();
        if actual != *owner {
            return Err(LedgerError::SignerMismatch {
                expected: *owner,
                actual,
            });
        }
        Ok(())
    }

    /// Build, sign, send and confirm a single instruction.
    async fn submit(
        &self,
        instruction: StorageInstruction,
        accounts: InstructionAccounts,
    ) -> Result<Signature, LedgerError> {
        self.ensure_signer(&accounts.user)?;

        let ix = build_instruction(&self.program_id, &instruction, accounts)?;
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed(&[ix], self.signer.as_ref(), blockhash)
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;

        let signature = self.rpc.send_transaction(&tx.serialize()).await?;
        tracing::debug!(
            instruction = instruction.name(),
            signature = %signature,
            "transaction submitted"
        );

        self.confirm(&signature).await?;
        tracing::info!(
            instruction = instruction.name(),
            signature = %signature,
            "transaction confirmed"
        );
        Ok(signature)
    }

    async fn confirm(&self, signature: &Signature) -> Result<(), LedgerError> {
        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        loop {
            if let Some(status) = self.rpc.get_signature_status(signature).await? {
                if let Some(err) = status.err.as_ref().filter(|e| !e.is_null()) {
                    return Err(classify_transaction_error(err)
                        .unwrap_or_else(|| LedgerError::Rejected(err.to_string())));
                }
                if status.is_confirmed() {
                    return Ok(());
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(LedgerError::Timeout(format!(
                    "transaction {signature} not confirmed within {:?}",
                    self.confirm_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("rpc_url", &self.rpc.url().as_str())
            .field("program_id", &self.program_id)
            .field("signer", &self.signer.pubkey())
            .finish()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    fn program_id(&self) -> Pubkey {
        self.program_id
    }

    async fn initialize_storage(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
    ) -> Result<Signature, LedgerError> {
        self.submit(
            StorageInstruction::InitializeStorage,
            InstructionAccounts {
                user: *owner,
                storage_account: Some(*storage),
                file_account: None,
            },
        )
        .await
    }

    async fn upload_file(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
        file: &Pubkey,
        args: &UploadFileArgs,
    ) -> Result<Signature, LedgerError> {
        self.submit(
            StorageInstruction::UploadFile(args.clone()),
            InstructionAccounts {
                user: *owner,
                storage_account: Some(*storage),
                file_account: Some(*file),
            },
        )
        .await
    }

    async fn delete_file(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
        file: &Pubkey,
    ) -> Result<Signature, LedgerError> {
        self.submit(
            StorageInstruction::DeleteFile,
            InstructionAccounts {
                user: *owner,
                storage_account: Some(*storage),
                file_account: Some(*file),
            },
        )
        .await
    }

    async fn share_file(
        &self,
        owner: &Pubkey,
        file: &Pubkey,
        is_public: bool,
    ) -> Result<Signature, LedgerError> {
        self.submit(
            StorageInstruction::ShareFile { is_public },
            InstructionAccounts {
                user: *owner,
                storage_account: None,
                file_account: Some(*file),
            },
        )
        .await
    }

    async fn download_file(
        &self,
        owner: &Pubkey,
        file: &Pubkey,
        file_hash: &str,
    ) -> Result<FileInfo, LedgerError> {
        self.submit(
            StorageInstruction::DownloadFile {
                file_hash: file_hash.to_string(),
            },
            InstructionAccounts {
                user: *owner,
                storage_account: None,
                file_account: Some(*file),
            },
        )
        .await?;

        // The instruction's return data is not surfaced by confirmation
        // polling; read the updated account instead.
        self.fetch_file_account(file)
            .await?
            .map(|account| account.info())
            .ok_or_else(|| LedgerError::NotFound(format!("file account {file}")))
    }

    async fn fetch_storage_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<StorageAccount>, LedgerError> {
        match self.rpc.get_account_data(address).await? {
            Some(data) => Ok(Some(StorageAccount::decode(&data)?)),
            None => Ok(None),
        }
    }

    async fn fetch_file_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<FileAccount>, LedgerError> {
        match self.rpc.get_account_data(address).await? {
            Some(data) => Ok(Some(FileAccount::decode(&data)?)),
            None => Ok(None),
        }
    }

    async fn list_file_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<(Pubkey, FileAccount)>, LedgerError> {
        let filters = [
            MemcmpFilter {
                offset: 0,
                bytes: file_account_discriminator().to_vec(),
            },
            MemcmpFilter {
                offset: FILE_OWNER_OFFSET,
                bytes: owner.to_bytes().to_vec(),
            },
        ];

        let raw = self
            .rpc
            .get_program_accounts(&self.program_id, &filters)
            .await?;

        let mut files = Vec::with_capacity(raw.len());
        for (address, data) in raw {
            match FileAccount::decode(&data) {
                Ok(account) => files.push((address, account)),
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "skipping undecodable file account");
                }
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::LocalKeypair;
    use base64ct::{Base64, Encoding};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn blockhash() -> String {
        bs58::encode([4u8; 32]).into_string()
    }

    fn keypair() -> Arc<LocalKeypair> {
        Arc::new(LocalKeypair::from_secret([3u8; 32]))
    }

    async fn ledger(server: &MockServer, signer: Arc<LocalKeypair>) -> RpcLedger {
        let rpc = RpcClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        RpcLedger::new(rpc, Pubkey::new([7u8; 32]), signer)
            .with_confirm_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(10))
    }

    fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result,
        }))
    }

    async fn mount_method(server: &MockServer, name: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": name })))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetches_and_decodes_storage_account() {
        let server = MockServer::start().await;
        let account = StorageAccount {
            owner: Pubkey::new([1u8; 32]),
            total_files: 2,
            total_storage_used: 2048,
            bump: 250,
        };
        mount_method(
            &server,
            "getAccountInfo",
            rpc_result(json!({
                "context": { "slot": 1 },
                "value": { "data": [Base64::encode_string(&account.encode()), "base64"] }
            })),
        )
        .await;

        let fetched = ledger(&server, keypair())
            .await
            .fetch_storage_account(&Pubkey::new([2u8; 32]))
            .await
            .unwrap();
        assert_eq!(fetched, Some(account));
    }

    #[tokio::test]
    async fn initialize_submits_and_confirms() {
        let server = MockServer::start().await;
        let signature = Signature::new([5u8; 64]);
        mount_method(
            &server,
            "getLatestBlockhash",
            rpc_result(json!({
                "context": { "slot": 1 },
                "value": { "blockhash": blockhash(), "lastValidBlockHeight": 100 }
            })),
        )
        .await;
        mount_method(&server, "sendTransaction", rpc_result(json!(signature.to_string()))).await;
        mount_method(
            &server,
            "getSignatureStatuses",
            rpc_result(json!({
                "context": { "slot": 2 },
                "value": [{ "slot": 2, "confirmations": 0, "err": null, "confirmationStatus": "confirmed" }]
            })),
        )
        .await;

        let signer = keypair();
        let owner = signer.pubkey();
        let result = ledger(&server, signer)
            .await
            .initialize_storage(&owner, &Pubkey::new([9u8; 32]))
            .await
            .unwrap();
        assert_eq!(result, signature);
    }

    #[tokio::test]
    async fn preflight_rejection_is_classified() {
        let server = MockServer::start().await;
        mount_method(
            &server,
            "getLatestBlockhash",
            rpc_result(json!({
                "context": { "slot": 1 },
                "value": { "blockhash": blockhash(), "lastValidBlockHeight": 100 }
            })),
        )
        .await;
        mount_method(
            &server,
            "sendTransaction",
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": -32002,
                    "message": "Transaction simulation failed",
                    "data": {
                        "err": { "InstructionError": [0, { "Custom": 6004 }] },
                        "logs": ["Program log: AnchorError: Unauthorized access"]
                    }
                }
            })),
        )
        .await;

        let signer = keypair();
        let owner = signer.pubkey();
        let err = ledger(&server, signer)
            .await
            .share_file(&owner, &Pubkey::new([9u8; 32]), true)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn failed_confirmation_is_classified() {
        let server = MockServer::start().await;
        mount_method(
            &server,
            "getLatestBlockhash",
            rpc_result(json!({
                "context": { "slot": 1 },
                "value": { "blockhash": blockhash(), "lastValidBlockHeight": 100 }
            })),
        )
        .await;
        mount_method(
            &server,
            "sendTransaction",
            rpc_result(json!(Signature::new([6u8; 64]).to_string())),
        )
        .await;
        mount_method(
            &server,
            "getSignatureStatuses",
            rpc_result(json!({
                "context": { "slot": 2 },
                "value": [{
                    "slot": 2,
                    "err": { "InstructionError": [0, { "Custom": 3012 }] },
                    "confirmationStatus": "confirmed"
                }]
            })),
        )
        .await;

        let signer = keypair();
        let owner = signer.pubkey();
        let err = ledger(&server, signer)
            .await
            .delete_file(&owner, &Pubkey::new([8u8; 32]), &Pubkey::new([9u8; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn unconfirmed_transaction_times_out() {
        let server = MockServer::start().await;
        mount_method(
            &server,
            "getLatestBlockhash",
            rpc_result(json!({
                "context": { "slot": 1 },
                "value": { "blockhash": blockhash(), "lastValidBlockHeight": 100 }
            })),
        )
        .await;
        mount_method(
            &server,
            "sendTransaction",
            rpc_result(json!(Signature::new([6u8; 64]).to_string())),
        )
        .await;
        mount_method(
            &server,
            "getSignatureStatuses",
            rpc_result(json!({ "context": { "slot": 2 }, "value": [null] })),
        )
        .await;

        let signer = keypair();
        let owner = signer.pubkey();
        let err = ledger(&server, signer)
            .await
            .with_confirm_timeout(Duration::from_millis(50))
            .initialize_storage(&owner, &Pubkey::new([9u8; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
    }

    #[tokio::test]
    async fn refuses_to_sign_for_another_owner() {
        let server = MockServer::start().await;
        let err = ledger(&server, keypair())
            .await
            .initialize_storage(&Pubkey::new([42u8; 32]), &Pubkey::new([9u8; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SignerMismatch { .. }));
    }

    #[tokio::test]
    async fn list_skips_undecodable_accounts() {
        let server = MockServer::start().await;
        let owner = Pubkey::new([1u8; 32]);
        let account = FileAccount {
            owner,
            file_hash: "ab".repeat(32),
            file_name: "a.txt".to_string(),
            file_size: 10,
            ipfs_hash: "QmHash".to_string(),
            encryption_key: None,
            upload_timestamp: 1,
            is_public: false,
            access_count: 0,
            bump: 255,
        };
        mount_method(
            &server,
            "getProgramAccounts",
            rpc_result(json!([
                { "pubkey": Pubkey::new([10u8; 32]).to_string(),
                  "account": { "data": [Base64::encode_string(&account.encode()), "base64"] } },
                { "pubkey": Pubkey::new([11u8; 32]).to_string(),
                  "account": { "data": [Base64::encode_string(&[0u8; 4]), "base64"] } }
            ])),
        )
        .await;

        let files = ledger(&server, keypair())
            .await
            .list_file_accounts(&owner)
            .await
            .unwrap();
        assert_eq!(files, vec![(Pubkey::new([10u8; 32]), account)]);
    }
}
