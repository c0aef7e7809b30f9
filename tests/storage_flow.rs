// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end session flows against the in-memory ledger and gateway.

use std::sync::Arc;
use std::time::Duration;

use dcloud_storage::blockchain::{
    AddressDeriver, InMemoryLedger, Ledger, Pubkey, Purpose, DEFAULT_PROGRAM_ID,
};
use dcloud_storage::content::hash_bytes;
use dcloud_storage::gateway::InMemoryGateway;
use dcloud_storage::projection::format_bytes;
use dcloud_storage::session::{
    InitializeOutcome, SessionConfig, SessionError, SessionState, StorageSession,
};

struct Harness {
    ledger: Arc<InMemoryLedger>,
    gateway: Arc<InMemoryGateway>,
}

impl Harness {
    fn new() -> Self {
        Self::with_ledger(InMemoryLedger::new(program_id()))
    }

    fn with_ledger(ledger: InMemoryLedger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            gateway: Arc::new(InMemoryGateway::new(
                "https://gateway.example".parse().unwrap(),
            )),
        }
    }

    fn session(&self) -> StorageSession {
        self.session_with(SessionConfig::default())
    }

    fn session_with(&self, config: SessionConfig) -> StorageSession {
        StorageSession::new(self.ledger.clone(), self.gateway.clone(), config)
    }
}

fn program_id() -> Pubkey {
    DEFAULT_PROGRAM_ID.parse().unwrap()
}

fn owner(byte: u8) -> Pubkey {
    Pubkey::new([byte; 32])
}

#[test]
fn hashing_and_derivation_are_stable() {
    let deriver = AddressDeriver::new(program_id());
    let a = hash_bytes(b"quarterly numbers");
    assert_eq!(a, hash_bytes(b"quarterly numbers"));
    assert_ne!(a, hash_bytes(b"quarterly numbers!"));
    assert_eq!(a.to_hex().len(), 64);

    let file = deriver.file_address(&owner(1), &a).unwrap();
    assert_eq!(file, deriver.file_address(&owner(1), &a).unwrap());
    assert_ne!(file.address, deriver.file_address(&owner(2), &a).unwrap().address);
    assert_ne!(
        file.address,
        deriver
            .file_address(&owner(1), &hash_bytes(b"other"))
            .unwrap()
            .address
    );

    let storage = deriver.storage_address(&owner(1)).unwrap();
    assert_ne!(storage.address, file.address);
    assert!(matches!(
        deriver.derive(Purpose::Storage, None, None),
        Err(dcloud_storage::blockchain::AddressError::MissingOwner)
    ));
}

#[tokio::test]
async fn report_upload_scenario() {
    let harness = Harness::new();
    let session = harness.session();
    let owner_x = owner(42);
    let payload = vec![0xABu8; 1024];

    assert_eq!(
        session.connect(owner_x).await.unwrap(),
        SessionState::Uninitialized
    );

    let receipt = session
        .upload_file("report.pdf", &payload, None)
        .await
        .unwrap();

    let hash = hash_bytes(&payload);
    assert_eq!(receipt.file_hash, hash.to_hex());
    assert_eq!(
        receipt.address,
        session.deriver().file_address(&owner_x, &hash).unwrap().address
    );
    assert!(matches!(receipt.initialized, Some(InitializeOutcome::Created(_))));
    assert_eq!(
        receipt.url.as_str(),
        format!("https://gateway.example/ipfs/{}", receipt.content_id)
    );
    assert_eq!(harness.gateway.get(&receipt.content_id).await, Some(payload));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Ready);
    let info = snapshot.storage_info.unwrap();
    assert_eq!(info.owner, owner_x);
    assert_eq!((info.total_files, info.total_storage_used), (1, 1024));

    let record = &snapshot.files[0];
    assert_eq!(record.account.file_name, "report.pdf");
    assert_eq!(record.account.file_size, 1024);
    assert_eq!(record.account.ipfs_hash, receipt.content_id.as_str());
    assert!(!record.account.is_public);
    assert_eq!(record.account.access_count, 0);

    let stats = snapshot.stats();
    assert_eq!(stats.total_files, 1);
    assert_eq!(format_bytes(stats.total_bytes), "1 KB");
    assert!(stats.is_reconciled());
}

#[tokio::test]
async fn initialize_twice_creates_one_account() {
    let harness = Harness::new();
    let session = harness.session();
    session.connect(owner(1)).await.unwrap();

    assert!(matches!(
        session.initialize_storage().await.unwrap(),
        InitializeOutcome::Created(_)
    ));
    assert_eq!(
        session.initialize_storage().await.unwrap(),
        InitializeOutcome::AlreadyInitialized
    );
    assert_eq!(harness.ledger.storage_account_count().await, 1);
}

#[tokio::test]
async fn totals_reconcile_after_uploads_and_deletes() {
    let harness = Harness::new();
    let session = harness.session();
    session.connect(owner(1)).await.unwrap();

    let a = session.upload_file("a.txt", &[1u8; 100], None).await.unwrap();
    session.upload_file("b.txt", &[2u8; 250], None).await.unwrap();
    session
        .upload_file("c.txt", &[3u8; 4000], Some("wrapped-key"))
        .await
        .unwrap();

    let stats = session.stats();
    assert_eq!((stats.total_files, stats.total_bytes), (3, 4350));
    assert!(stats.is_reconciled());

    session.delete_file(&a.address).await.unwrap();
    let stats = session.stats();
    assert_eq!((stats.total_files, stats.total_bytes), (2, 4250));
    assert!(stats.is_reconciled());
    assert!(session.files().iter().all(|r| r.address != a.address));

    assert!(matches!(
        session.delete_file(&a.address).await,
        Err(SessionError::NotFound(_))
    ));
    assert_eq!(session.stats().total_files, 2);
}

#[tokio::test]
async fn owners_see_only_their_own_files() {
    let harness = Harness::new();
    let alice = harness.session();
    let bob = harness.session();
    alice.connect(owner(1)).await.unwrap();
    bob.connect(owner(2)).await.unwrap();

    let shared_bytes = b"identical bytes".to_vec();
    let a = alice.upload_file("a.txt", &shared_bytes, None).await.unwrap();
    let b = bob.upload_file("b.txt", &shared_bytes, None).await.unwrap();
    assert_ne!(a.address, b.address);

    let alice_files = alice.list_files().await.unwrap();
    let bob_files = bob.list_files().await.unwrap();
    assert_eq!(alice_files.len(), 1);
    assert_eq!(bob_files.len(), 1);
    assert!(alice_files.iter().all(|r| r.account.owner == owner(1)));
    assert!(bob_files.iter().all(|r| r.account.owner == owner(2)));

    assert!(matches!(
        bob.delete_file(&a.address).await,
        Err(SessionError::PermissionDenied(_))
    ));
    assert!(matches!(
        bob.share_file(&a.address, true).await,
        Err(SessionError::PermissionDenied(_))
    ));
    assert_eq!(alice.list_files().await.unwrap().len(), 1);
    assert_eq!(harness.ledger.file_account_count().await, 2);
}

#[tokio::test]
async fn sharing_controls_foreign_downloads() {
    let harness = Harness::new();
    let alice = harness.session();
    let bob = harness.session();
    alice.connect(owner(1)).await.unwrap();
    bob.connect(owner(2)).await.unwrap();

    let receipt = alice.upload_file("photo.png", b"pixels", None).await.unwrap();
    assert!(matches!(
        bob.download_file(&receipt.address).await,
        Err(SessionError::PermissionDenied(_))
    ));

    alice.share_file(&receipt.address, true).await.unwrap();
    let ticket = bob.download_file(&receipt.address).await.unwrap();
    assert_eq!(ticket.info.owner, owner(1));
    assert_eq!(ticket.info.access_count, 1);

    alice.share_file(&receipt.address, false).await.unwrap();
    let record = alice
        .files()
        .into_iter()
        .find(|r| r.address == receipt.address)
        .unwrap();
    assert!(!record.account.is_public);
    assert_eq!(record.account.access_count, 1);
    assert!(matches!(
        bob.download_file(&receipt.address).await,
        Err(SessionError::PermissionDenied(_))
    ));

    let own = alice.download_file(&receipt.address).await.unwrap();
    assert_eq!(own.info.access_count, 2);
    assert_eq!(alice.stats().total_access, 2);
}

#[tokio::test]
async fn duplicate_content_is_rejected_before_pinning() {
    let harness = Harness::new();
    let session = harness.session();
    session.connect(owner(1)).await.unwrap();

    session.upload_file("a.txt", b"same", None).await.unwrap();
    assert_eq!(harness.gateway.pinned_count().await, 1);

    assert!(matches!(
        session.upload_file("copy-of-a.txt", b"same", None).await,
        Err(SessionError::AlreadyExists(_))
    ));
    assert_eq!(harness.gateway.pinned_count().await, 1);
    assert_eq!(session.stats().total_files, 1);
}

#[tokio::test]
async fn uploads_from_disk() {
    let harness = Harness::new();
    let session = harness.session();
    session.connect(owner(1)).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    std::fs::write(&path, b"# notes\n").unwrap();

    let receipt = session.upload_path(&path, None).await.unwrap();
    assert_eq!(receipt.file_hash, hash_bytes(b"# notes\n").to_hex());
    assert_eq!(session.files()[0].account.file_name, "notes.md");

    assert!(matches!(
        session.upload_path(dir.path().join("missing.md"), None).await,
        Err(SessionError::HashingFailed(_))
    ));
}

#[tokio::test]
async fn mutations_are_serialized() {
    let harness =
        Harness::with_ledger(InMemoryLedger::new(program_id()).with_latency(Duration::from_millis(20)));
    let session = Arc::new(harness.session());
    session.connect(owner(1)).await.unwrap();
    session.initialize_storage().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..4u8 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            session
                .upload_file(&format!("file-{i}.bin"), &[i; 64], None)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(harness.ledger.max_concurrent_mutations(), 1);
    let stats = session.stats();
    assert_eq!((stats.total_files, stats.total_bytes), (4, 256));
    assert!(stats.is_reconciled());
    assert!(!session.loading());
}

#[tokio::test]
async fn disconnect_cancels_in_flight_upload() {
    let harness =
        Harness::with_ledger(InMemoryLedger::new(program_id()).with_latency(Duration::from_millis(200)));
    let session = Arc::new(harness.session());
    session.connect(owner(1)).await.unwrap();

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.upload_file("late.txt", b"late", None).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.loading());
    session.disconnect().await;

    assert!(matches!(task.await.unwrap(), Err(SessionError::Cancelled)));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(snapshot.owner.is_none());
    assert!(snapshot.files.is_empty());
    assert!(!snapshot.loading());
}

#[tokio::test]
async fn switching_owner_discards_previous_results() {
    let harness =
        Harness::with_ledger(InMemoryLedger::new(program_id()).with_latency(Duration::from_millis(100)));
    let session = Arc::new(harness.session());
    session.connect(owner(1)).await.unwrap();

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.initialize_storage().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.connect(owner(2)).await.unwrap();

    assert!(matches!(task.await.unwrap(), Err(SessionError::Cancelled)));
    assert_eq!(session.owner(), Some(owner(2)));
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn slow_ledger_times_out() {
    let harness =
        Harness::with_ledger(InMemoryLedger::new(program_id()).with_latency(Duration::from_millis(300)));
    let session = harness.session_with(SessionConfig {
        request_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    });

    assert!(matches!(
        session.connect(owner(1)).await,
        Err(SessionError::Timeout(_))
    ));
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert!(!session.loading());
}

#[tokio::test]
async fn ledger_state_survives_reconnect() {
    let harness = Harness::new();
    let session = harness.session();
    session.connect(owner(1)).await.unwrap();
    let receipt = session.upload_file("keep.txt", b"keep", None).await.unwrap();

    session.disconnect().await;
    assert!(session.files().is_empty());

    assert_eq!(session.connect(owner(1)).await.unwrap(), SessionState::Ready);
    assert_eq!(session.files()[0].address, receipt.address);

    let storage = session.deriver().storage_address(&owner(1)).unwrap().address;
    let info = harness.ledger.get_storage_info(&storage).await.unwrap();
    assert_eq!(info.total_files, 1);
}
