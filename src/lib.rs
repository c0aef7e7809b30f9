// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! dcloud storage - Decentralized File Storage Client
//!
//! Wallet-connected client for the dcloud on-chain storage program. File bytes
//! are pinned on IPFS, and each owner's file records live in program-derived
//! accounts on Solana.
//!
//! ## Modules
//!
//! - `content` - SHA-256 content hashing
//! - `blockchain` - Address derivation, program codec, JSON-RPC and ledgers
//! - `gateway` - IPFS pinning (Pinata)
//! - `session` - Account session state machine
//! - `projection` - Statistics derived from the file list
//! - `api` - Local HTTP bridge for the web UI (Axum)

pub mod api;
pub mod blockchain;
pub mod config;
pub mod content;
pub mod error;
pub mod gateway;
pub mod models;
pub mod ownership;
pub mod projection;
pub mod session;
pub mod state;
pub mod telemetry;
