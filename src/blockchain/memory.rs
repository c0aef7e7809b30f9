// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process ledger for tests and offline runs.
//!
//! Applies the storage program's rules (field limits, seed constraints,
//! ownership checks, totals accounting) to accounts held in memory. Latency
//! and one-shot failures can be injected per operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::address::AddressDeriver;
use super::ledger::{Ledger, LedgerError};
use super::types::{FileAccount, FileInfo, Pubkey, Signature, StorageAccount, UploadFileArgs};
use crate::content::ContentHash;

/// Limits enforced by the storage program.
pub const MAX_FILE_HASH_LEN: usize = 64;
pub const MAX_FILE_NAME_LEN: usize = 100;
pub const MAX_IPFS_HASH_LEN: usize = 100;

/// Ledger operations, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOperation {
    InitializeStorage,
    UploadFile,
    DeleteFile,
    ShareFile,
    DownloadFile,
    FetchStorageAccount,
    FetchFileAccount,
    ListFileAccounts,
}

#[derive(Default)]
struct LedgerState {
    storage: HashMap<Pubkey, StorageAccount>,
    files: HashMap<Pubkey, FileAccount>,
    failures: HashMap<LedgerOperation, LedgerError>,
    lost_results: HashMap<LedgerOperation, LedgerError>,
}

/// Ledger emulation holding accounts in memory.
pub struct InMemoryLedger {
    deriver: AddressDeriver,
    state: Mutex<LedgerState>,
    latency: Duration,
    tx_counter: AtomicU64,
    in_flight_mutations: AtomicUsize,
    max_concurrent_mutations: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            deriver: AddressDeriver::new(program_id),
            state: Mutex::new(LedgerState::default()),
            latency: Duration::ZERO,
            tx_counter: AtomicU64::new(0),
            in_flight_mutations: AtomicUsize::new(0),
            max_concurrent_mutations: AtomicUsize::new(0),
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: LedgerOperation, error: LedgerError) {
        self.state.lock().await.failures.insert(operation, error);
    }

    /// Let the next call of `operation` commit, then report `error` to the
    /// caller as if the response was lost.
    pub async fn fail_after_commit(&self, operation: LedgerOperation, error: LedgerError) {
        self.state.lock().await.lost_results.insert(operation, error);
    }

    /// Highest number of mutating calls observed in flight at once.
    pub fn max_concurrent_mutations(&self) -> usize {
        self.max_concurrent_mutations.load(Ordering::SeqCst)
    }

    pub async fn storage_account_count(&self) -> usize {
        self.state.lock().await.storage.len()
    }

    pub async fn file_account_count(&self) -> usize {
        self.state.lock().await.files.len()
    }

    async fn enter(&self, operation: LedgerOperation) -> Result<(), LedgerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.state.lock().await.failures.remove(&operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs a mutating call: tracks concurrency, applies latency and
    /// injected failures, then applies `apply` to the state.
    async fn mutate<T>(
        &self,
        operation: LedgerOperation,
        apply: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let _guard = MutationGuard::enter(self);
        self.enter(operation).await?;
        let mut state = self.state.lock().await;
        let value = apply(&mut state)?;
        match state.lost_results.remove(&operation) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn next_signature(&self, operation: LedgerOperation) -> Signature {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let seed = format!("{operation:?}:{n}");
        let first: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
        let second: [u8; 32] = Sha256::digest(first).into();
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&first);
        bytes[32..].copy_from_slice(&second);
        Signature::new(bytes)
    }

    fn check_storage_seeds(&self, owner: &Pubkey, storage: &Pubkey) -> Result<u8, LedgerError> {
        let derived = self
            .deriver
            .storage_address(owner)
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;
        if derived.address != *storage {
            return Err(LedgerError::PermissionDenied(format!(
                "storage account {storage} does not match seeds for {owner}"
            )));
        }
        Ok(derived.bump)
    }

    fn check_file_seeds(
        &self,
        owner: &Pubkey,
        file_hash: &str,
        file: &Pubkey,
    ) -> Result<u8, LedgerError> {
        let hash: ContentHash = file_hash
            .parse()
            .map_err(|e| LedgerError::InvalidInput(format!("file hash: {e}")))?;
        let derived = self
            .deriver
            .file_address(owner, &hash)
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;
        if derived.address != *file {
            return Err(LedgerError::PermissionDenied(format!(
                "file account {file} does not match seeds"
            )));
        }
        Ok(derived.bump)
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("program_id", self.deriver.program_id())
            .field("latency", &self.latency)
            .finish()
    }
}

struct MutationGuard<'a> {
    ledger: &'a InMemoryLedger,
}

impl<'a> MutationGuard<'a> {
    fn enter(ledger: &'a InMemoryLedger) -> Self {
        let now = ledger.in_flight_mutations.fetch_add(1, Ordering::SeqCst) + 1;
        ledger
            .max_concurrent_mutations
            .fetch_max(now, Ordering::SeqCst);
        Self { ledger }
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.ledger.in_flight_mutations.fetch_sub(1, Ordering::SeqCst);
    }
}

fn validate_upload(args: &UploadFileArgs) -> Result<(), LedgerError> {
    if args.file_hash.len() > MAX_FILE_HASH_LEN {
        return Err(LedgerError::InvalidInput("File hash too long".to_string()));
    }
    if args.file_name.len() > MAX_FILE_NAME_LEN {
        return Err(LedgerError::InvalidInput("File name too long".to_string()));
    }
    if args.ipfs_hash.len() > MAX_IPFS_HASH_LEN {
        return Err(LedgerError::InvalidInput("IPFS hash too long".to_string()));
    }
    if args.file_size == 0 {
        return Err(LedgerError::InvalidInput("Invalid file size".to_string()));
    }
    Ok(())
}

fn owned_file<'s>(
    state: &'s mut LedgerState,
    owner: &Pubkey,
    file: &Pubkey,
) -> Result<&'s mut FileAccount, LedgerError> {
    let account = state
        .files
        .get_mut(file)
        .ok_or_else(|| LedgerError::NotFound(format!("file account {file}")))?;
    if account.owner != *owner {
        return Err(LedgerError::PermissionDenied("Unauthorized access".to_string()));
    }
    Ok(account)
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn program_id(&self) -> Pubkey {
        *self.deriver.program_id()
    }

    async fn initialize_storage(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
    ) -> Result<Signature, LedgerError> {
        let bump = self.check_storage_seeds(owner, storage)?;
        self.mutate(LedgerOperation::InitializeStorage, |state| {
            if state.storage.contains_key(storage) {
                return Err(LedgerError::AlreadyExists(format!(
                    "account {storage} already in use"
                )));
            }
            state.storage.insert(
                *storage,
                StorageAccount {
                    owner: *owner,
                    total_files: 0,
                    total_storage_used: 0,
                    bump,
                },
            );
            Ok(())
        })
        .await?;
        Ok(self.next_signature(LedgerOperation::InitializeStorage))
    }

    async fn upload_file(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
        file: &Pubkey,
        args: &UploadFileArgs,
    ) -> Result<Signature, LedgerError> {
        validate_upload(args)?;
        self.check_storage_seeds(owner, storage)?;
        let bump = self.check_file_seeds(owner, &args.file_hash, file)?;

        self.mutate(LedgerOperation::UploadFile, |state| {
            if state.files.contains_key(file) {
                return Err(LedgerError::AlreadyExists(format!(
                    "account {file} already in use"
                )));
            }
            let totals = state
                .storage
                .get_mut(storage)
                .ok_or_else(|| LedgerError::NotFound(format!("storage account {storage}")))?;

            let total_files = totals
                .total_files
                .checked_add(1)
                .ok_or_else(|| LedgerError::Rejected("file count overflow".to_string()))?;
            let total_storage_used = totals
                .total_storage_used
                .checked_add(args.file_size)
                .ok_or_else(|| LedgerError::Rejected("storage total overflow".to_string()))?;
            totals.total_files = total_files;
            totals.total_storage_used = total_storage_used;

            state.files.insert(
                *file,
                FileAccount {
                    owner: *owner,
                    file_hash: args.file_hash.clone(),
                    file_name: args.file_name.clone(),
                    file_size: args.file_size,
                    ipfs_hash: args.ipfs_hash.clone(),
                    encryption_key: args.encryption_key.clone(),
                    upload_timestamp: Utc::now().timestamp(),
                    is_public: false,
                    access_count: 0,
                    bump,
                },
            );
            Ok(())
        })
        .await?;
        Ok(self.next_signature(LedgerOperation::UploadFile))
    }

    async fn delete_file(
        &self,
        owner: &Pubkey,
        storage: &Pubkey,
        file: &Pubkey,
    ) -> Result<Signature, LedgerError> {
        self.check_storage_seeds(owner, storage)?;
        self.mutate(LedgerOperation::DeleteFile, |state| {
            let size = owned_file(state, owner, file)?.file_size;
            let totals = state
                .storage
                .get_mut(storage)
                .ok_or_else(|| LedgerError::NotFound(format!("storage account {storage}")))?;

            let total_files = totals
                .total_files
                .checked_sub(1)
                .ok_or_else(|| LedgerError::Rejected("file count underflow".to_string()))?;
            let total_storage_used = totals
                .total_storage_used
                .checked_sub(size)
                .ok_or_else(|| LedgerError::Rejected("storage total underflow".to_string()))?;
            totals.total_files = total_files;
            totals.total_storage_used = total_storage_used;

            state.files.remove(file);
            Ok(())
        })
        .await?;
        Ok(self.next_signature(LedgerOperation::DeleteFile))
    }

    async fn share_file(
        &self,
        owner: &Pubkey,
        file: &Pubkey,
        is_public: bool,
    ) -> Result<Signature, LedgerError> {
        self.mutate(LedgerOperation::ShareFile, |state| {
            owned_file(state, owner, file)?.is_public = is_public;
            Ok(())
        })
        .await?;
        Ok(self.next_signature(LedgerOperation::ShareFile))
    }

    async fn download_file(
        &self,
        owner: &Pubkey,
        file: &Pubkey,
        file_hash: &str,
    ) -> Result<FileInfo, LedgerError> {
        self.mutate(LedgerOperation::DownloadFile, |state| {
            let account = state
                .files
                .get_mut(file)
                .ok_or_else(|| LedgerError::NotFound(format!("file account {file}")))?;
            if account.file_hash != file_hash {
                return Err(LedgerError::PermissionDenied(format!(
                    "file account {file} does not match seeds"
                )));
            }
            if account.owner != *owner && !account.is_public {
                return Err(LedgerError::PermissionDenied("Unauthorized access".to_string()));
            }
            account.access_count = account
                .access_count
                .checked_add(1)
                .ok_or_else(|| LedgerError::Rejected("access count overflow".to_string()))?;
            Ok(account.info())
        })
        .await
    }

    async fn fetch_storage_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<StorageAccount>, LedgerError> {
        self.enter(LedgerOperation::FetchStorageAccount).await?;
        Ok(self.state.lock().await.storage.get(address).cloned())
    }

    async fn fetch_file_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<FileAccount>, LedgerError> {
        self.enter(LedgerOperation::FetchFileAccount).await?;
        Ok(self.state.lock().await.files.get(address).cloned())
    }

    async fn list_file_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<(Pubkey, FileAccount)>, LedgerError> {
        self.enter(LedgerOperation::ListFileAccounts).await?;
        let state = self.state.lock().await;
        let mut files: Vec<(Pubkey, FileAccount)> = state
            .files
            .iter()
            .filter(|(_, account)| account.owner == *owner)
            .map(|(address, account)| (*address, account.clone()))
            .collect();
        files.sort_by(|a, b| {
            a.1.upload_timestamp
                .cmp(&b.1.upload_timestamp)
                .then_with(|| a.0.as_bytes().cmp(b.0.as_bytes()))
        });
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::hash_bytes;

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(Pubkey::new([7u8; 32]))
    }

    fn args_for(bytes: &[u8], name: &str) -> UploadFileArgs {
        UploadFileArgs {
            file_hash: hash_bytes(bytes).to_hex(),
            file_name: name.to_string(),
            file_size: bytes.len() as u64,
            ipfs_hash: "QmTest".to_string(),
            encryption_key: None,
        }
    }

    struct Owner {
        key: Pubkey,
        storage: Pubkey,
    }

    fn owner(ledger: &InMemoryLedger, byte: u8) -> Owner {
        let key = Pubkey::new([byte; 32]);
        let storage = ledger.deriver.storage_address(&key).unwrap().address;
        Owner { key, storage }
    }

    fn file_address(ledger: &InMemoryLedger, owner: &Owner, bytes: &[u8]) -> Pubkey {
        ledger
            .deriver
            .file_address(&owner.key, &hash_bytes(bytes))
            .unwrap()
            .address
    }

    #[tokio::test]
    async fn initialize_twice_reports_already_exists() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        ledger.initialize_storage(&o.key, &o.storage).await.unwrap();
        let second = ledger.initialize_storage(&o.key, &o.storage).await;
        assert!(matches!(second, Err(LedgerError::AlreadyExists(_))));
        assert_eq!(ledger.storage_account_count().await, 1);
    }

    #[tokio::test]
    async fn initialize_rejects_foreign_seeds() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        let other = owner(&ledger, 2);
        let result = ledger.initialize_storage(&o.key, &other.storage).await;
        assert!(matches!(result, Err(LedgerError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn upload_and_delete_keep_totals() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        ledger.initialize_storage(&o.key, &o.storage).await.unwrap();

        let bytes = vec![1u8; 1024];
        let file = file_address(&ledger, &o, &bytes);
        ledger
            .upload_file(&o.key, &o.storage, &file, &args_for(&bytes, "report.pdf"))
            .await
            .unwrap();

        let info = ledger.get_storage_info(&o.storage).await.unwrap();
        assert_eq!((info.total_files, info.total_storage_used), (1, 1024));

        ledger.delete_file(&o.key, &o.storage, &file).await.unwrap();
        let info = ledger.get_storage_info(&o.storage).await.unwrap();
        assert_eq!((info.total_files, info.total_storage_used), (0, 0));
        assert!(ledger.fetch_file_account(&file).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upload_requires_storage_account() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        let file = file_address(&ledger, &o, b"x");
        let result = ledger
            .upload_file(&o.key, &o.storage, &file, &args_for(b"x", "x"))
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_upload_collides() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        ledger.initialize_storage(&o.key, &o.storage).await.unwrap();
        let file = file_address(&ledger, &o, b"same");
        let args = args_for(b"same", "a.txt");
        ledger.upload_file(&o.key, &o.storage, &file, &args).await.unwrap();
        let again = ledger.upload_file(&o.key, &o.storage, &file, &args).await;
        assert!(matches!(again, Err(LedgerError::AlreadyExists(_))));
        assert_eq!(ledger.file_account_count().await, 1);
    }

    #[tokio::test]
    async fn field_limits_are_enforced() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        ledger.initialize_storage(&o.key, &o.storage).await.unwrap();
        let file = file_address(&ledger, &o, b"data");

        let mut long_name = args_for(b"data", "x");
        long_name.file_name = "n".repeat(MAX_FILE_NAME_LEN + 1);
        let mut empty = args_for(b"data", "x");
        empty.file_size = 0;

        for args in [long_name, empty] {
            let result = ledger.upload_file(&o.key, &o.storage, &file, &args).await;
            assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn non_owner_cannot_mutate() {
        let ledger = ledger();
        let alice = owner(&ledger, 1);
        let bob = owner(&ledger, 2);
        ledger.initialize_storage(&alice.key, &alice.storage).await.unwrap();
        ledger.initialize_storage(&bob.key, &bob.storage).await.unwrap();

        let file = file_address(&ledger, &alice, b"secret");
        ledger
            .upload_file(&alice.key, &alice.storage, &file, &args_for(b"secret", "s"))
            .await
            .unwrap();

        let delete = ledger.delete_file(&bob.key, &bob.storage, &file).await;
        assert!(matches!(delete, Err(LedgerError::PermissionDenied(_))));
        let share = ledger.share_file(&bob.key, &file, true).await;
        assert!(matches!(share, Err(LedgerError::PermissionDenied(_))));
        let hash = hash_bytes(b"secret").to_hex();
        let download = ledger.download_file(&bob.key, &file, &hash).await;
        assert!(matches!(download, Err(LedgerError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn public_files_are_downloadable_by_others() {
        let ledger = ledger();
        let alice = owner(&ledger, 1);
        let bob = owner(&ledger, 2);
        ledger.initialize_storage(&alice.key, &alice.storage).await.unwrap();
        let file = file_address(&ledger, &alice, b"shared");
        ledger
            .upload_file(&alice.key, &alice.storage, &file, &args_for(b"shared", "s"))
            .await
            .unwrap();
        ledger.share_file(&alice.key, &file, true).await.unwrap();

        let hash = hash_bytes(b"shared").to_hex();
        let first = ledger.download_file(&bob.key, &file, &hash).await.unwrap();
        let second = ledger.download_file(&alice.key, &file, &hash).await.unwrap();
        assert_eq!(first.access_count, 1);
        assert_eq!(second.access_count, 2);
    }

    #[tokio::test]
    async fn injected_failure_is_one_shot() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        ledger
            .fail_next(
                LedgerOperation::InitializeStorage,
                LedgerError::Request("connection reset".to_string()),
            )
            .await;
        assert!(matches!(
            ledger.initialize_storage(&o.key, &o.storage).await,
            Err(LedgerError::Request(_))
        ));
        ledger.initialize_storage(&o.key, &o.storage).await.unwrap();
    }

    #[tokio::test]
    async fn lost_result_still_commits() {
        let ledger = ledger();
        let o = owner(&ledger, 1);
        ledger
            .fail_after_commit(
                LedgerOperation::InitializeStorage,
                LedgerError::Timeout("no response".to_string()),
            )
            .await;
        assert!(matches!(
            ledger.initialize_storage(&o.key, &o.storage).await,
            Err(LedgerError::Timeout(_))
        ));
        assert!(ledger.fetch_storage_account(&o.storage).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_filters_by_owner() {
        let ledger = ledger();
        let alice = owner(&ledger, 1);
        let bob = owner(&ledger, 2);
        for o in [&alice, &bob] {
            ledger.initialize_storage(&o.key, &o.storage).await.unwrap();
            let bytes = [o.key.as_bytes()[0]; 8];
            let file = file_address(&ledger, o, &bytes);
            ledger
                .upload_file(&o.key, &o.storage, &file, &args_for(&bytes, "f"))
                .await
                .unwrap();
        }
        let files = ledger.list_file_accounts(&alice.key).await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.iter().all(|(_, f)| f.owner == alice.key));
    }
}
