// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger integration for the Solana storage program.
//!
//! This module provides functionality for:
//! - Deriving storage and file account addresses
//! - Encoding instructions and decoding program accounts
//! - Building and signing transactions
//! - Talking to a cluster over JSON-RPC, or to an in-memory ledger

pub mod address;
pub mod client;
pub mod ledger;
pub mod memory;
pub mod program;
pub mod rpc_ledger;
pub mod signing;
pub mod transactions;
pub mod types;

pub use address::{AddressDeriver, AddressError, DerivedAddress, Purpose};
pub use client::{RpcClient, RpcError};
pub use ledger::{Ledger, LedgerError};
pub use memory::{InMemoryLedger, LedgerOperation};
pub use rpc_ledger::RpcLedger;
pub use signing::{LocalKeypair, SigningError, TransactionSigner};
pub use types::*;
