// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner filtering for ledger snapshots.
//!
//! Ledger queries filter by owner on the server side, but a snapshot handed
//! to the session is only trusted after every record passes through here.

use crate::blockchain::{FileAccount, Pubkey};

/// Resources recorded against an owner identity.
pub trait OwnedResource {
    fn owner(&self) -> &Pubkey;
}

impl OwnedResource for FileAccount {
    fn owner(&self) -> &Pubkey {
        &self.owner
    }
}

impl<T: OwnedResource> OwnedResource for (Pubkey, T) {
    fn owner(&self) -> &Pubkey {
        self.1.owner()
    }
}

/// Ownership predicate over owned resources.
pub trait OwnershipCheck {
    fn is_owned_by(&self, owner: &Pubkey) -> bool;
}

impl<T: OwnedResource> OwnershipCheck for T {
    fn is_owned_by(&self, owner: &Pubkey) -> bool {
        self.owner() == owner
    }
}

/// Keep only resources owned by `owner`, logging anything dropped.
pub fn retain_owned<T: OwnedResource>(items: Vec<T>, owner: &Pubkey) -> Vec<T> {
    let total = items.len();
    let owned: Vec<T> = items
        .into_iter()
        .filter(|item| item.is_owned_by(owner))
        .collect();

    if owned.len() != total {
        tracing::warn!(
            owner = %owner,
            dropped = total - owned.len(),
            "ledger snapshot contained records of another owner"
        );
    }
    owned
}
