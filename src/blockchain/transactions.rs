// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legacy transaction building for the storage program.
//!
//! A transaction is a list of signatures followed by a message:
//!
//! ```text
//! header (3 bytes) | account keys | recent blockhash | instructions
//! ```
//!
//! Account keys are ordered writable signers, read-only signers, writable
//! non-signers, read-only non-signers, with the fee payer first. Instructions
//! refer to accounts by index into that list.

use super::signing::TransactionSigner;
use super::types::{Pubkey, Signature};

/// An account referenced by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    /// A non-signing account.
    pub fn new(pubkey: Pubkey, is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable,
        }
    }

    /// A signing account.
    pub fn signer(pubkey: Pubkey, is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable,
        }
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Append a compact-u16 length (7 bits per byte, high bit = continuation).
pub fn encode_compact_u16(buf: &mut Vec<u8>, value: u16) {
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            buf.push(byte);
            return;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Errors raised while compiling a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("too many accounts in message ({0})")]
    TooManyAccounts(usize),

    #[error("instruction data too large ({0} bytes)")]
    DataTooLarge(usize),

    #[error("signer {0} is not part of the message")]
    UnknownSigner(Pubkey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompiledInstruction {
    program_id_index: u8,
    accounts: Vec<u8>,
    data: Vec<u8>,
}

/// A compiled legacy message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` with `payer` as fee payer.
    pub fn compile(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: [u8; 32],
    ) -> Result<Self, TransactionError> {
        // (key, is_signer, is_writable), merged across all references.
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::signer(*payer, true)];
        let mut merge = |meta: AccountMeta| {
            match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                Some(existing) => {
                    existing.is_signer |= meta.is_signer;
                    existing.is_writable |= meta.is_writable;
                }
                None => metas.push(meta),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(*meta);
            }
            merge(AccountMeta::new(ix.program_id, false));
        }

        // Stable sort keeps the payer first inside its group.
        let rank = |m: &AccountMeta| match (m.is_signer, m.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        metas.sort_by_key(rank);

        if metas.len() > usize::from(u8::MAX) {
            return Err(TransactionError::TooManyAccounts(metas.len()));
        }

        let count = |signer: bool, writable: bool| {
            metas
                .iter()
                .filter(|m| m.is_signer == signer && m.is_writable == writable)
                .count() as u8
        };
        let num_required_signatures =
            metas.iter().filter(|m| m.is_signer).count() as u8;
        let num_readonly_signed = count(true, false);
        let num_readonly_unsigned = count(false, false);

        let account_keys: Vec<Pubkey> = metas.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &Pubkey| {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or(TransactionError::UnknownSigner(*key))
        };

        let mut compiled = Vec::with_capacity(instructions.len());
        for ix in instructions {
            if ix.data.len() > usize::from(u16::MAX) {
                return Err(TransactionError::DataTooLarge(ix.data.len()));
            }
            let accounts = ix
                .accounts
                .iter()
                .map(|m| index_of(&m.pubkey))
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push(CompiledInstruction {
                program_id_index: index_of(&ix.program_id)?,
                accounts,
                data: ix.data.clone(),
            });
        }

        Ok(Self {
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Serialized message bytes; this is what signers sign.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![
            self.num_required_signatures,
            self.num_readonly_signed,
            self.num_readonly_unsigned,
        ];
        encode_compact_u16(&mut buf, self.account_keys.len() as u16);
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }
        buf.extend_from_slice(&self.recent_blockhash);
        encode_compact_u16(&mut buf, self.instructions.len() as u16);
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_compact_u16(&mut buf, ix.accounts.len() as u16);
            buf.extend_from_slice(&ix.accounts);
            encode_compact_u16(&mut buf, ix.data.len() as u16);
            buf.extend_from_slice(&ix.data);
        }
        buf
    }
}

/// A signed transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Compile and sign a single-signer transaction.
    pub fn new_signed(
        instructions: &[Instruction],
        signer: &dyn TransactionSigner,
        recent_blockhash: [u8; 32],
    ) -> Result<Self, TransactionError> {
        let payer = signer.pubkey();
        let message = Message::compile(instructions, &payer, recent_blockhash)?;
        if message.num_required_signatures != 1 {
            let extra = message
                .account_keys
                .iter()
                .take(usize::from(message.num_required_signatures))
                .find(|k| **k != payer)
                .copied()
                .unwrap_or(payer);
            return Err(TransactionError::UnknownSigner(extra));
        }
        let signature = signer.sign_message(&message.serialize());
        Ok(Self {
            signatures: vec![signature],
            message,
        })
    }

    /// The first signature identifies the transaction.
    pub fn id(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_compact_u16(&mut buf, self.signatures.len() as u16);
        for sig in &self.signatures {
            buf.extend_from_slice(sig.as_bytes());
        }
        buf.extend_from_slice(&self.message.serialize());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::LocalKeypair;
    use crate::blockchain::SYSTEM_PROGRAM_ID;

    #[test]
    fn compact_u16_encoding() {
        let cases: [(u16, &[u8]); 5] = [
            (0, &[0x00]),
            (0x7f, &[0x7f]),
            (0x80, &[0x80, 0x01]),
            (0x3fff, &[0xff, 0x7f]),
            (0x4000, &[0x80, 0x80, 0x01]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            encode_compact_u16(&mut buf, value);
            assert_eq!(buf, expected, "value {value:#x}");
        }
    }

    #[test]
    fn message_orders_accounts_by_role() {
        let payer = Pubkey::new([1u8; 32]);
        let storage = Pubkey::new([2u8; 32]);
        let program = Pubkey::new([3u8; 32]);
        let ix = Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::signer(payer, true),
                AccountMeta::new(storage, true),
                AccountMeta::new(SYSTEM_PROGRAM_ID, false),
            ],
            data: vec![1, 2, 3],
        };

        let message = Message::compile(&[ix], &payer, [9u8; 32]).unwrap();
        assert_eq!(message.num_required_signatures, 1);
        assert_eq!(message.num_readonly_signed, 0);
        assert_eq!(message.num_readonly_unsigned, 2);
        assert_eq!(message.account_keys[0], payer);
        assert_eq!(message.account_keys[1], storage);
        assert!(message.account_keys[2..].contains(&program));
        assert!(message.account_keys[2..].contains(&SYSTEM_PROGRAM_ID));
    }

    #[test]
    fn read_only_signer_is_promoted_for_payer() {
        let payer = Pubkey::new([1u8; 32]);
        let ix = Instruction {
            program_id: Pubkey::new([3u8; 32]),
            accounts: vec![AccountMeta::signer(payer, false)],
            data: vec![],
        };
        let message = Message::compile(&[ix], &payer, [0u8; 32]).unwrap();
        // The fee payer is always writable.
        assert_eq!(message.num_readonly_signed, 0);
    }

    #[test]
    fn signed_transaction_layout() {
        let keypair = LocalKeypair::from_secret([11u8; 32]);
        let program = Pubkey::new([3u8; 32]);
        let ix = Instruction {
            program_id: program,
            accounts: vec![AccountMeta::signer(keypair.pubkey(), true)],
            data: vec![42],
        };

        let tx = Transaction::new_signed(&[ix], &keypair, [7u8; 32]).unwrap();
        let bytes = tx.serialize();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..65], tx.id().unwrap().as_bytes());
        assert_eq!(&bytes[65..], tx.message.serialize().as_slice());
        assert!(keypair.verify(&tx.message.serialize(), tx.id().unwrap()));
    }

    #[test]
    fn foreign_signer_is_rejected() {
        let keypair = LocalKeypair::from_secret([11u8; 32]);
        let stranger = Pubkey::new([99u8; 32]);
        let ix = Instruction {
            program_id: Pubkey::new([3u8; 32]),
            accounts: vec![AccountMeta::signer(stranger, false)],
            data: vec![],
        };
        let result = Transaction::new_signed(&[ix], &keypair, [0u8; 32]);
        assert_eq!(result.unwrap_err(), TransactionError::UnknownSigner(stranger));
    }
}
