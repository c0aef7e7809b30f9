// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage session
//!
//! [`StorageSession`] drives the request sequence for one connected owner:
//!
//! ```text
//! Disconnected --connect--> Uninitialized --initialize / lookup--> Ready
//!       ^                         |                                 |
//!       +---------disconnect------+---------------------------------+
//! ```
//!
//! ## Ordering
//!
//! Mutating operations (initialize, upload, delete, share, download) hold a
//! single gate for their whole duration, so at most one is in flight. Reads
//! (list, refresh) do not take the gate and return weakly consistent
//! snapshots.
//!
//! ## Cancellation
//!
//! Every connection has an epoch and a cancellation token. Disconnecting (or
//! switching owner) cancels the token; in-flight remote calls resolve to
//! [`SessionError::Cancelled`] and results whose epoch no longer matches are
//! never written to the observable state.
//!
//! ## Truth
//!
//! The ledger is authoritative. After every mutating call, successful or not,
//! the session re-fetches the storage account and the file list before
//! reporting.

mod error;
mod types;

pub use error::SessionError;
pub use types::{
    DownloadTicket, FileRecord, InitializeOutcome, SessionConfig, SessionSnapshot, SessionState,
    UploadLimits, UploadReceipt, DEFAULT_MAX_FILE_SIZE, DEFAULT_REQUEST_TIMEOUT,
};

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;

use crate::blockchain::{AddressDeriver, Ledger, Pubkey, Signature, StorageInfo, UploadFileArgs};
use crate::content::{hash_bytes, hash_file, ContentHash};
use crate::gateway::{ContentGateway, ContentId};
use crate::ownership::retain_owned;
use crate::projection::StorageStats;

struct Connection {
    owner: Option<Pubkey>,
    epoch: u64,
    token: CancellationToken,
}

/// Identity and cancellation scope of one operation.
#[derive(Clone)]
struct OpContext {
    owner: Pubkey,
    storage: Pubkey,
    epoch: u64,
    token: CancellationToken,
}

/// Counts an operation as in flight until dropped.
struct LoadingGuard<'a> {
    snapshot: &'a watch::Sender<SessionSnapshot>,
    epoch: u64,
}

impl<'a> LoadingGuard<'a> {
    fn new(snapshot: &'a watch::Sender<SessionSnapshot>, epoch: u64) -> Self {
        snapshot.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.in_flight += 1;
            true
        });
        Self { snapshot, epoch }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let epoch = self.epoch;
        self.snapshot.send_if_modified(|s| {
            if s.epoch != epoch || s.in_flight == 0 {
                return false;
            }
            s.in_flight -= 1;
            true
        });
    }
}

/// Client-side session for one owner at a time.
pub struct StorageSession {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn ContentGateway>,
    deriver: AddressDeriver,
    config: SessionConfig,
    connection: RwLock<Connection>,
    gate: Mutex<()>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl StorageSession {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn ContentGateway>,
        config: SessionConfig,
    ) -> Self {
        let deriver = AddressDeriver::new(ledger.program_id());
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            ledger,
            gateway,
            deriver,
            config,
            connection: RwLock::new(Connection {
                owner: None,
                epoch: 0,
                token: CancellationToken::new(),
            }),
            gate: Mutex::new(()),
            snapshot,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    // =========================================================================
    // Observables
    // =========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn owner(&self) -> Option<Pubkey> {
        self.snapshot.borrow().owner
    }

    pub fn storage_info(&self) -> Option<StorageInfo> {
        self.snapshot.borrow().storage_info
    }

    pub fn files(&self) -> Vec<FileRecord> {
        self.snapshot.borrow().files.clone()
    }

    pub fn loading(&self) -> bool {
        self.snapshot.borrow().loading()
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot.borrow().is_initialized()
    }

    pub fn stats(&self) -> StorageStats {
        self.snapshot.borrow().stats()
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect `owner` and look up its existing storage account.
    ///
    /// Reconnecting the current owner is a no-op once `Ready` and looks up the
    /// storage account again otherwise. Connecting a different owner cancels
    /// everything in flight for the previous one.
    pub async fn connect(&self, owner: Pubkey) -> Result<SessionState, SessionError> {
        let storage = self.deriver.storage_address(&owner)?.address;
        let ctx = {
            let mut conn = self.connection.write().await;
            if conn.owner == Some(owner) {
                if self.state() == SessionState::Ready {
                    return Ok(SessionState::Ready);
                }
                // Same owner, storage not confirmed yet: look it up again.
                OpContext {
                    owner,
                    storage,
                    epoch: conn.epoch,
                    token: conn.token.clone(),
                }
            } else {
                self.begin_connection(&mut conn, owner, storage)
            }
        };

        tracing::info!(owner = %owner, epoch = ctx.epoch, "wallet connected");

        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);
        self.refresh_with(&ctx).await?;
        Ok(self.state())
    }

    /// Start a new epoch for `owner`, cancelling the previous connection.
    fn begin_connection(&self, conn: &mut Connection, owner: Pubkey, storage: Pubkey) -> OpContext {
        conn.token.cancel();
        conn.epoch += 1;
        conn.owner = Some(owner);
        conn.token = CancellationToken::new();

        let epoch = conn.epoch;
        self.snapshot.send_replace(SessionSnapshot {
            state: SessionState::Uninitialized,
            owner: Some(owner),
            epoch,
            ..SessionSnapshot::default()
        });

        OpContext {
            owner,
            storage,
            epoch,
            token: conn.token.clone(),
        }
    }

    /// Drop the owner identity. In-flight operations resolve to `Cancelled`.
    pub async fn disconnect(&self) {
        let mut conn = self.connection.write().await;
        conn.token.cancel();
        conn.epoch += 1;
        let previous = conn.owner.take();
        conn.token = CancellationToken::new();

        self.snapshot.send_replace(SessionSnapshot {
            epoch: conn.epoch,
            ..SessionSnapshot::default()
        });

        if let Some(owner) = previous {
            tracing::info!(owner = %owner, "wallet disconnected");
        }
    }

    // =========================================================================
    // Mutating operations
    // =========================================================================

    /// Create the owner's storage account. An existing account counts as
    /// success.
    pub async fn initialize_storage(&self) -> Result<InitializeOutcome, SessionError> {
        let ctx = self.context().await?;
        let _gate = self.acquire_gate(&ctx).await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        let result = self.initialize_with(&ctx).await;
        self.settle(&ctx, result).await
    }

    /// Hash, pin and record `bytes` as `name`.
    ///
    /// Initializes storage first when needed. Re-uploading identical bytes is
    /// rejected with `AlreadyExists` before anything is pinned.
    pub async fn upload_file(
        &self,
        name: &str,
        bytes: &[u8],
        encryption_key: Option<&str>,
    ) -> Result<UploadReceipt, SessionError> {
        let ctx = self.context().await?;
        self.config
            .limits
            .validate(name, bytes.len() as u64, encryption_key)?;
        let hash = hash_bytes(bytes);
        self.upload_hashed(&ctx, name, bytes, hash, encryption_key)
            .await
    }

    /// Upload a file from disk, named after its file name.
    pub async fn upload_path(
        &self,
        path: impl AsRef<Path>,
        encryption_key: Option<&str>,
    ) -> Result<UploadReceipt, SessionError> {
        let ctx = self.context().await?;
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SessionError::InvalidInput(format!("{} has no file name", path.display())))?
            .to_string();

        let (hash, bytes) = hash_file(path, self.config.limits.max_file_size).await?;
        self.config
            .limits
            .validate(&name, bytes.len() as u64, encryption_key)?;
        self.upload_hashed(&ctx, &name, &bytes, hash, encryption_key)
            .await
    }

    async fn upload_hashed(
        &self,
        ctx: &OpContext,
        name: &str,
        bytes: &[u8],
        hash: ContentHash,
        encryption_key: Option<&str>,
    ) -> Result<UploadReceipt, SessionError> {
        let _gate = self.acquire_gate(ctx).await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        let result = self
            .upload_with(ctx, name, bytes, hash, encryption_key)
            .await;
        self.settle(ctx, result).await
    }

    /// Delete a file record. Ownership is enforced by the ledger.
    pub async fn delete_file(&self, address: &Pubkey) -> Result<Signature, SessionError> {
        let ctx = self.context().await?;
        let _gate = self.acquire_gate(&ctx).await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        let result = self
            .remote(
                &ctx,
                "delete_file",
                self.ledger.delete_file(&ctx.owner, &ctx.storage, address),
            )
            .await;
        if let Ok(signature) = &result {
            tracing::info!(owner = %ctx.owner, file = %address, signature = %signature, "file deleted");
        }
        self.settle(&ctx, result).await
    }

    /// Set the visibility flag of a file record.
    pub async fn share_file(
        &self,
        address: &Pubkey,
        make_public: bool,
    ) -> Result<Signature, SessionError> {
        let ctx = self.context().await?;
        let _gate = self.acquire_gate(&ctx).await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        let result = self
            .remote(
                &ctx,
                "share_file",
                self.ledger.share_file(&ctx.owner, address, make_public),
            )
            .await;
        if let Ok(signature) = &result {
            tracing::info!(
                owner = %ctx.owner,
                file = %address,
                is_public = make_public,
                signature = %signature,
                "file visibility updated"
            );
        }
        self.settle(&ctx, result).await
    }

    /// Record an access and return the retrieval link. Calling it repeatedly
    /// is valid; each call bumps the ledger's access counter.
    pub async fn download_file(&self, address: &Pubkey) -> Result<DownloadTicket, SessionError> {
        let ctx = self.context().await?;
        let _gate = self.acquire_gate(&ctx).await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        let result = self.download_with(&ctx, address).await;
        self.settle(&ctx, result).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch the owner's file records and replace the cached list.
    pub async fn list_files(&self) -> Result<Vec<FileRecord>, SessionError> {
        let ctx = self.context().await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        let files = self.fetch_files(&ctx).await?;
        self.apply(&ctx, |s| s.files = files.clone())?;
        Ok(files)
    }

    /// Fetch the owner's storage totals. `None` means storage is not
    /// initialized.
    pub async fn refresh_storage_info(&self) -> Result<Option<StorageInfo>, SessionError> {
        let ctx = self.context().await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        let info = self.fetch_storage_info(&ctx).await?;
        self.apply(&ctx, |s| {
            s.storage_info = info;
            s.state = state_for(info.as_ref());
        })?;
        Ok(info)
    }

    /// Re-fetch storage totals and files.
    pub async fn refresh(&self) -> Result<SessionSnapshot, SessionError> {
        let ctx = self.context().await?;
        let _loading = LoadingGuard::new(&self.snapshot, ctx.epoch);

        self.refresh_with(&ctx).await?;
        Ok(self.snapshot())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn context(&self) -> Result<OpContext, SessionError> {
        let conn = self.connection.read().await;
        let owner = conn.owner.ok_or(SessionError::NotConnected)?;
        Ok(OpContext {
            owner,
            storage: self.deriver.storage_address(&owner)?.address,
            epoch: conn.epoch,
            token: conn.token.clone(),
        })
    }

    async fn acquire_gate(&self, ctx: &OpContext) -> Result<MutexGuard<'_, ()>, SessionError> {
        tokio::select! {
            _ = ctx.token.cancelled() => Err(SessionError::Cancelled),
            guard = self.gate.lock() => {
                if ctx.token.is_cancelled() {
                    return Err(SessionError::Cancelled);
                }
                Ok(guard)
            }
        }
    }

    /// Run a remote call bounded by the request timeout and the connection's
    /// cancellation token.
    async fn remote<T, E, F>(
        &self,
        ctx: &OpContext,
        operation: &'static str,
        call: F,
    ) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, E>>,
        SessionError: From<E>,
    {
        let timeout = self.config.request_timeout;
        tokio::select! {
            _ = ctx.token.cancelled() => {
                tracing::debug!(operation, "discarding cancelled call");
                Err(SessionError::Cancelled)
            }
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(result) => result.map_err(SessionError::from),
                Err(_) => {
                    tracing::warn!(operation, timeout = ?timeout, "remote call timed out");
                    Err(SessionError::Timeout(format!("{operation} exceeded {timeout:?}")))
                }
            }
        }
    }

    /// Write to the observable state if `ctx` is still the live connection.
    fn apply(
        &self,
        ctx: &OpContext,
        update: impl FnOnce(&mut SessionSnapshot),
    ) -> Result<(), SessionError> {
        let mut applied = false;
        self.snapshot.send_if_modified(|s| {
            if s.epoch != ctx.epoch || ctx.token.is_cancelled() {
                return false;
            }
            update(s);
            applied = true;
            true
        });

        if applied {
            Ok(())
        } else {
            tracing::debug!(epoch = ctx.epoch, "discarding stale result");
            Err(SessionError::Cancelled)
        }
    }

    /// Refresh after a mutating call. A committed mutation is reported even
    /// when the reload fails, with the snapshot marked stale; failures are
    /// reported after a best-effort refresh.
    async fn settle<T>(
        &self,
        ctx: &OpContext,
        result: Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        match result {
            Ok(value) => match self.refresh_with(ctx).await {
                Ok(()) => Ok(value),
                Err(SessionError::Cancelled) => Err(SessionError::Cancelled),
                Err(refresh_err) => {
                    tracing::warn!(error = %refresh_err, "mutation committed but refresh failed");
                    self.apply(ctx, |s| s.stale = true)?;
                    Ok(value)
                }
            },
            Err(SessionError::Cancelled) => Err(SessionError::Cancelled),
            Err(err) => {
                if let Err(refresh_err) = self.refresh_with(ctx).await {
                    tracing::warn!(
                        error = %refresh_err,
                        original = %err,
                        "failed to refresh after error"
                    );
                }
                Err(err)
            }
        }
    }

    async fn initialize_with(&self, ctx: &OpContext) -> Result<InitializeOutcome, SessionError> {
        let result = self
            .remote(
                ctx,
                "initialize_storage",
                self.ledger.initialize_storage(&ctx.owner, &ctx.storage),
            )
            .await;

        match result {
            Ok(signature) => {
                tracing::info!(owner = %ctx.owner, signature = %signature, "storage initialized");
                Ok(InitializeOutcome::Created(signature))
            }
            Err(SessionError::AlreadyExists(detail)) => {
                tracing::info!(owner = %ctx.owner, detail = %detail, "storage already initialized");
                Ok(InitializeOutcome::AlreadyInitialized)
            }
            Err(err) => Err(err),
        }
    }

    async fn upload_with(
        &self,
        ctx: &OpContext,
        name: &str,
        bytes: &[u8],
        hash: ContentHash,
        encryption_key: Option<&str>,
    ) -> Result<UploadReceipt, SessionError> {
        let file_hash = hash.to_hex();
        self.config.limits.validate_file_hash(&file_hash)?;

        let initialized = if self.state() == SessionState::Ready {
            None
        } else {
            Some(self.initialize_with(ctx).await?)
        };

        let file = self.deriver.file_address(&ctx.owner, &hash)?.address;

        let existing = self
            .remote(ctx, "fetch_file_account", self.ledger.fetch_file_account(&file))
            .await?;
        if existing.is_some() {
            return Err(SessionError::AlreadyExists(format!(
                "file {hash} is already stored at {file}"
            )));
        }

        let content_id = self
            .remote(ctx, "pin", self.gateway.pin(name, bytes))
            .await?;
        self.config.limits.validate_content_id(&content_id)?;

        let args = UploadFileArgs {
            file_hash,
            file_name: name.to_string(),
            file_size: bytes.len() as u64,
            ipfs_hash: content_id.as_str().to_string(),
            encryption_key: encryption_key.map(str::to_string),
        };
        let signature = match self
            .remote(
                ctx,
                "upload_file",
                self.ledger.upload_file(&ctx.owner, &ctx.storage, &file, &args),
            )
            .await
        {
            Ok(signature) => Some(signature),
            Err(err) if err.is_ambiguous() => {
                if !self.upload_landed(ctx, &file, &args).await {
                    return Err(err);
                }
                tracing::warn!(file = %file, error = %err, "upload response lost, record found on ledger");
                None
            }
            Err(err) => return Err(err),
        };

        tracing::info!(
            owner = %ctx.owner,
            file = %file,
            cid = %content_id,
            size = args.file_size,
            signature = ?signature,
            "file uploaded"
        );

        Ok(UploadReceipt {
            address: file,
            file_hash: args.file_hash,
            url: self.gateway.url_for(&content_id)?,
            content_id,
            signature,
            initialized,
        })
    }

    /// Whether the ledger holds the record `args` describes.
    async fn upload_landed(&self, ctx: &OpContext, file: &Pubkey, args: &UploadFileArgs) -> bool {
        match self
            .remote(ctx, "fetch_file_account", self.ledger.fetch_file_account(file))
            .await
        {
            Ok(Some(account)) => account.owner == ctx.owner && account.file_hash == args.file_hash,
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(file = %file, error = %e, "could not confirm upload");
                false
            }
        }
    }

    async fn download_with(
        &self,
        ctx: &OpContext,
        address: &Pubkey,
    ) -> Result<DownloadTicket, SessionError> {
        let record = self
            .remote(ctx, "fetch_file_account", self.ledger.fetch_file_account(address))
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("file account {address}")))?;

        let info = self
            .remote(
                ctx,
                "download_file",
                self.ledger
                    .download_file(&ctx.owner, address, &record.file_hash),
            )
            .await?;

        let url = self.gateway.url_for(&ContentId::new(info.ipfs_hash.clone())?)?;
        tracing::debug!(file = %address, access_count = info.access_count, "file accessed");
        Ok(DownloadTicket { info, url })
    }

    async fn fetch_storage_info(&self, ctx: &OpContext) -> Result<Option<StorageInfo>, SessionError> {
        let account = self
            .remote(
                ctx,
                "fetch_storage_account",
                self.ledger.fetch_storage_account(&ctx.storage),
            )
            .await?;
        Ok(account.as_ref().map(StorageInfo::from))
    }

    async fn fetch_files(&self, ctx: &OpContext) -> Result<Vec<FileRecord>, SessionError> {
        let raw = self
            .remote(
                ctx,
                "list_file_accounts",
                self.ledger.list_file_accounts(&ctx.owner),
            )
            .await?;
        Ok(retain_owned(raw, &ctx.owner)
            .into_iter()
            .map(|(address, account)| FileRecord { address, account })
            .collect())
    }

    async fn refresh_with(&self, ctx: &OpContext) -> Result<(), SessionError> {
        let (info, files) = tokio::try_join!(self.fetch_storage_info(ctx), self.fetch_files(ctx))?;
        let state = state_for(info.as_ref());
        self.apply(ctx, |s| {
            s.state = state;
            s.storage_info = info;
            s.files = files;
            s.stale = false;
        })?;
        tracing::debug!(owner = %ctx.owner, state = ?state, "session refreshed");
        Ok(())
    }
}

fn state_for(info: Option<&StorageInfo>) -> SessionState {
    match info {
        Some(_) => SessionState::Ready,
        None => SessionState::Uninitialized,
    }
}

impl std::fmt::Debug for StorageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSession")
            .field("program_id", self.deriver.program_id())
            .field("config", &self.config)
            .field("state", &self.state())
            .field("owner", &self.owner())
            .finish()
    }
}
