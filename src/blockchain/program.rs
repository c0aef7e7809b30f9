// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire format of the dcloud storage program.
//!
//! The program is an Anchor program: instruction data is an 8-byte
//! discriminator (`sha256("global:<name>")[..8]`) followed by borsh-encoded
//! arguments, and every account starts with `sha256("account:<Type>")[..8]`
//! followed by its borsh-encoded fields.

use sha2::{Digest, Sha256};

use super::transactions::{AccountMeta, Instruction};
use super::types::{FileAccount, Pubkey, StorageAccount, UploadFileArgs, SYSTEM_PROGRAM_ID};

/// Errors decoding program data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("account data too short: needed {needed} more bytes at offset {offset}")]
    UnexpectedEnd { offset: usize, needed: usize },

    #[error("account discriminator mismatch for {0}")]
    DiscriminatorMismatch(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Anchor discriminator of an instruction.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    discriminator("global", name)
}

/// Anchor discriminator of an account type.
pub fn account_discriminator(type_name: &str) -> [u8; 8] {
    discriminator("account", type_name)
}

pub fn storage_account_discriminator() -> [u8; 8] {
    account_discriminator("StorageAccount")
}

pub fn file_account_discriminator() -> [u8; 8] {
    account_discriminator("FileAccount")
}

// =============================================================================
// Borsh primitives
// =============================================================================

/// Little-endian borsh writer.
#[derive(Debug, Default)]
pub struct BorshWriter {
    buf: Vec<u8>,
}

impl BorshWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: &[u8]) -> Self {
        Self {
            buf: prefix.to_vec(),
        }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(u8::from(value))
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn pubkey(&mut self, value: &Pubkey) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        // Program-side limits keep every string far below u32::MAX.
        self.u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn option_string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(s) => self.u8(1).string(s),
            None => self.u8(0),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over borsh-encoded bytes. Trailing bytes are ignored, since
/// accounts are allocated at their maximum size.
pub struct BorshReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BorshReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProgramError> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.offset..end];
                self.offset = end;
                Ok(slice)
            }
            None => Err(ProgramError::UnexpectedEnd {
                offset: self.offset,
                needed: len,
            }),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProgramError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn expect_discriminator(
        &mut self,
        expected: [u8; 8],
        type_name: &'static str,
    ) -> Result<(), ProgramError> {
        if self.array::<8>()? == expected {
            Ok(())
        } else {
            Err(ProgramError::DiscriminatorMismatch(type_name))
        }
    }

    pub fn u8(&mut self) -> Result<u8, ProgramError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool, ProgramError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProgramError::InvalidField {
                field,
                reason: format!("bool byte {other}"),
            }),
        }
    }

    pub fn u32(&mut self) -> Result<u32, ProgramError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, ProgramError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, ProgramError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn pubkey(&mut self) -> Result<Pubkey, ProgramError> {
        Ok(Pubkey::new(self.array()?))
    }

    pub fn string(&mut self, field: &'static str) -> Result<String, ProgramError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ProgramError::InvalidField {
            field,
            reason: e.to_string(),
        })
    }

    pub fn option_string(&mut self, field: &'static str) -> Result<Option<String>, ProgramError> {
        match self.u8()? {
            0 => Ok(None),
            1 => self.string(field).map(Some),
            other => Err(ProgramError::InvalidField {
                field,
                reason: format!("option tag {other}"),
            }),
        }
    }
}

// =============================================================================
// Accounts
// =============================================================================

impl StorageAccount {
    pub fn decode(data: &[u8]) -> Result<Self, ProgramError> {
        let mut r = BorshReader::new(data);
        r.expect_discriminator(storage_account_discriminator(), "StorageAccount")?;
        Ok(Self {
            owner: r.pubkey()?,
            total_files: r.u32()?,
            total_storage_used: r.u64()?,
            bump: r.u8()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = BorshWriter::with_prefix(&storage_account_discriminator());
        w.pubkey(&self.owner)
            .u32(self.total_files)
            .u64(self.total_storage_used)
            .u8(self.bump);
        w.into_bytes()
    }
}

impl FileAccount {
    pub fn decode(data: &[u8]) -> Result<Self, ProgramError> {
        let mut r = BorshReader::new(data);
        r.expect_discriminator(file_account_discriminator(), "FileAccount")?;
        Ok(Self {
            owner: r.pubkey()?,
            file_hash: r.string("file_hash")?,
            file_name: r.string("file_name")?,
            file_size: r.u64()?,
            ipfs_hash: r.string("ipfs_hash")?,
            encryption_key: r.option_string("encryption_key")?,
            upload_timestamp: r.i64()?,
            is_public: r.bool("is_public")?,
            access_count: r.u64()?,
            bump: r.u8()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = BorshWriter::with_prefix(&file_account_discriminator());
        w.pubkey(&self.owner)
            .string(&self.file_hash)
            .string(&self.file_name)
            .u64(self.file_size)
            .string(&self.ipfs_hash)
            .option_string(self.encryption_key.as_deref())
            .i64(self.upload_timestamp)
            .bool(self.is_public)
            .u64(self.access_count)
            .u8(self.bump);
        w.into_bytes()
    }
}

// =============================================================================
// Instructions
// =============================================================================

/// Instructions exposed by the storage program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageInstruction {
    InitializeStorage,
    UploadFile(UploadFileArgs),
    DownloadFile { file_hash: String },
    DeleteFile,
    ShareFile { is_public: bool },
}

impl StorageInstruction {
    pub fn name(&self) -> &'static str {
        match self {
            StorageInstruction::InitializeStorage => "initialize_storage",
            StorageInstruction::UploadFile(_) => "upload_file",
            StorageInstruction::DownloadFile { .. } => "download_file",
            StorageInstruction::DeleteFile => "delete_file",
            StorageInstruction::ShareFile { .. } => "share_file",
        }
    }

    /// Discriminator followed by the borsh-encoded arguments.
    pub fn data(&self) -> Vec<u8> {
        let mut w = BorshWriter::with_prefix(&instruction_discriminator(self.name()));
        match self {
            StorageInstruction::InitializeStorage | StorageInstruction::DeleteFile => {}
            StorageInstruction::UploadFile(args) => {
                w.string(&args.file_hash)
                    .string(&args.file_name)
                    .u64(args.file_size)
                    .string(&args.ipfs_hash)
                    .option_string(args.encryption_key.as_deref());
            }
            StorageInstruction::DownloadFile { file_hash } => {
                w.string(file_hash);
            }
            StorageInstruction::ShareFile { is_public } => {
                w.bool(*is_public);
            }
        }
        w.into_bytes()
    }
}

/// Accounts touched by an instruction, in program order.
#[derive(Debug, Clone, Copy)]
pub struct InstructionAccounts {
    pub user: Pubkey,
    pub storage_account: Option<Pubkey>,
    pub file_account: Option<Pubkey>,
}

/// Build a ready-to-sign instruction for `program_id`.
pub fn build_instruction(
    program_id: &Pubkey,
    instruction: &StorageInstruction,
    accounts: InstructionAccounts,
) -> Result<Instruction, ProgramError> {
    let storage = || {
        accounts.storage_account.ok_or(ProgramError::InvalidField {
            field: "storage_account",
            reason: "required by instruction".to_string(),
        })
    };
    let file = || {
        accounts.file_account.ok_or(ProgramError::InvalidField {
            field: "file_account",
            reason: "required by instruction".to_string(),
        })
    };

    let metas = match instruction {
        StorageInstruction::InitializeStorage => vec![
            AccountMeta::signer(accounts.user, true),
            AccountMeta::new(storage()?, true),
            AccountMeta::new(SYSTEM_PROGRAM_ID, false),
        ],
        StorageInstruction::UploadFile(_) => vec![
            AccountMeta::signer(accounts.user, true),
            AccountMeta::new(storage()?, true),
            AccountMeta::new(file()?, true),
            AccountMeta::new(SYSTEM_PROGRAM_ID, false),
        ],
        StorageInstruction::DownloadFile { .. } => vec![
            AccountMeta::signer(accounts.user, false),
            AccountMeta::new(file()?, true),
        ],
        StorageInstruction::DeleteFile => vec![
            AccountMeta::signer(accounts.user, true),
            AccountMeta::new(storage()?, true),
            AccountMeta::new(file()?, true),
        ],
        StorageInstruction::ShareFile { .. } => vec![
            AccountMeta::signer(accounts.user, false),
            AccountMeta::new(file()?, true),
        ],
    };

    Ok(Instruction {
        program_id: *program_id,
        accounts: metas,
        data: instruction.data(),
    })
}
