// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Program-derived account addresses.
//!
//! Storage and file accounts live at addresses derived from fixed seeds and
//! the program id, so the client can locate them without any lookup:
//!
//! | Purpose | Seeds |
//! |---------|-------|
//! | storage | `"storage"`, owner key |
//! | file    | `"file"`, owner key, raw content hash |
//!
//! The derivation hashes `seeds ‖ bump ‖ program_id ‖ "ProgramDerivedAddress"`
//! and walks the bump down from 255 until the digest is off the ed25519
//! curve, so no private key can exist for the resulting address.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use super::types::Pubkey;
use crate::content::ContentHash;

/// Maximum number of seeds per derivation.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Seed tag for storage accounts.
pub const STORAGE_SEED: &str = "storage";

/// Seed tag for file accounts.
pub const FILE_SEED: &str = "file";

/// Errors raised by address derivation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("owner identity is required")]
    MissingOwner,

    #[error("invalid derivation input: {0}")]
    InvalidInput(String),

    #[error("derived address lies on the curve")]
    OnCurve,

    #[error("no viable bump seed found")]
    NoViableBump,
}

/// Account purposes the client derives addresses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Storage,
    File,
}

impl Purpose {
    pub fn tag(self) -> &'static str {
        match self {
            Purpose::Storage => STORAGE_SEED,
            Purpose::File => FILE_SEED,
        }
    }
}

/// A derived address and the bump that made it fall off the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

fn check_seeds(seeds: &[&[u8]], max_seeds: usize) -> Result<(), AddressError> {
    if seeds.len() > max_seeds {
        return Err(AddressError::InvalidInput(format!(
            "too many seeds ({} > {max_seeds})",
            seeds.len()
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(AddressError::InvalidInput(format!(
            "seed of {} bytes exceeds {MAX_SEED_LEN}",
            seed.len()
        )));
    }
    Ok(())
}

/// Hash seeds (bump included) into an address, rejecting on-curve results.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<Pubkey, AddressError> {
    check_seeds(seeds, MAX_SEEDS)?;

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    let digest: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&digest) {
        return Err(AddressError::OnCurve);
    }
    Ok(Pubkey::new(digest))
}

/// Find the canonical (highest-bump) program address for `seeds`.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<DerivedAddress, AddressError> {
    // One slot is reserved for the bump.
    check_seeds(seeds, MAX_SEEDS - 1)?;

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok(DerivedAddress { address, bump }),
            Err(AddressError::OnCurve) => continue,
            Err(other) => return Err(other),
        }
    }
    Err(AddressError::NoViableBump)
}

/// Derives storage and file account addresses for one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Pubkey,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Derive the address for `purpose`.
    ///
    /// `discriminator` is required for [`Purpose::File`] and must be absent
    /// for [`Purpose::Storage`].
    pub fn derive(
        &self,
        purpose: Purpose,
        owner: Option<&Pubkey>,
        discriminator: Option<&ContentHash>,
    ) -> Result<DerivedAddress, AddressError> {
        let owner = owner.ok_or(AddressError::MissingOwner)?;
        let tag = purpose.tag().as_bytes();

        match (purpose, discriminator) {
            (Purpose::Storage, None) => {
                find_program_address(&[tag, owner.as_ref()], &self.program_id)
            }
            (Purpose::File, Some(hash)) => find_program_address(
                &[tag, owner.as_ref(), hash.as_bytes()],
                &self.program_id,
            ),
            (Purpose::Storage, Some(_)) => Err(AddressError::InvalidInput(
                "storage addresses take no discriminator".to_string(),
            )),
            (Purpose::File, None) => Err(AddressError::InvalidInput(
                "file addresses require a content hash".to_string(),
            )),
        }
    }

    pub fn storage_address(&self, owner: &Pubkey) -> Result<DerivedAddress, AddressError> {
        self.derive(Purpose::Storage, Some(owner), None)
    }

    pub fn file_address(
        &self,
        owner: &Pubkey,
        hash: &ContentHash,
    ) -> Result<DerivedAddress, AddressError> {
        self.derive(Purpose::File, Some(owner), Some(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::DEFAULT_PROGRAM_ID;
    use crate::content::hash_bytes;

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(DEFAULT_PROGRAM_ID.parse().unwrap())
    }

    fn owner(byte: u8) -> Pubkey {
        Pubkey::new([byte; 32])
    }

    #[test]
    fn storage_address_is_stable() {
        let d = deriver();
        let first = d.storage_address(&owner(1)).unwrap();
        let second = d.storage_address(&owner(1)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn derived_address_is_off_curve_and_recreatable() {
        let d = deriver();
        let o = owner(9);
        let derived = d.storage_address(&o).unwrap();
        assert!(!is_on_curve(derived.address.as_bytes()));

        let recreated = create_program_address(
            &[STORAGE_SEED.as_bytes(), o.as_ref(), &[derived.bump]],
            d.program_id(),
        )
        .unwrap();
        assert_eq!(recreated, derived.address);
    }

    #[test]
    fn file_addresses_separate_by_hash_and_owner() {
        let d = deriver();
        let a = hash_bytes(b"first");
        let b = hash_bytes(b"second");

        let owner_a_a = d.file_address(&owner(1), &a).unwrap().address;
        let owner_a_b = d.file_address(&owner(1), &b).unwrap().address;
        let owner_b_a = d.file_address(&owner(2), &a).unwrap().address;

        assert_ne!(owner_a_a, owner_a_b);
        assert_ne!(owner_a_a, owner_b_a);
        assert_eq!(owner_a_a, d.file_address(&owner(1), &a).unwrap().address);
    }

    #[test]
    fn file_and_storage_purposes_do_not_collide() {
        let d = deriver();
        let storage = d.storage_address(&owner(4)).unwrap().address;
        let file = d
            .file_address(&owner(4), &hash_bytes(b"x"))
            .unwrap()
            .address;
        assert_ne!(storage, file);
    }

    #[test]
    fn program_id_is_part_of_the_derivation() {
        let other = AddressDeriver::new(Pubkey::new([42u8; 32]));
        assert_ne!(
            deriver().storage_address(&owner(1)).unwrap(),
            other.storage_address(&owner(1)).unwrap()
        );
    }

    #[test]
    fn missing_owner_is_rejected() {
        assert_eq!(
            deriver().derive(Purpose::Storage, None, None),
            Err(AddressError::MissingOwner)
        );
    }

    #[test]
    fn discriminator_must_match_purpose() {
        let d = deriver();
        let hash = hash_bytes(b"x");
        assert!(matches!(
            d.derive(Purpose::File, Some(&owner(1)), None),
            Err(AddressError::InvalidInput(_))
        ));
        assert!(matches!(
            d.derive(Purpose::Storage, Some(&owner(1)), Some(&hash)),
            Err(AddressError::InvalidInput(_))
        ));
    }

    #[test]
    fn oversized_seed_is_rejected() {
        let long = [0u8; 33];
        let result = find_program_address(&[&long], deriver().program_id());
        assert!(matches!(result, Err(AddressError::InvalidInput(_))));
    }

    #[test]
    fn too_many_seeds_are_rejected() {
        let seed: &[u8] = b"s";
        let program_id = deriver().program_id().to_owned();

        let full = vec![seed; MAX_SEEDS];
        assert!(matches!(
            find_program_address(&full, &program_id),
            Err(AddressError::InvalidInput(_))
        ));

        let over = vec![seed; MAX_SEEDS + 1];
        assert!(matches!(
            create_program_address(&over, &program_id),
            Err(AddressError::InvalidInput(_))
        ));
    }

    /// Known-answer vectors published with the Solana SDK.
    #[test]
    fn matches_solana_reference_addresses() {
        let program_id: Pubkey = "BPFLoaderUpgradeab1e11111111111111111111111".parse().unwrap();
        let seed_key: Pubkey = "SeedPubey1111111111111111111111111111111111".parse().unwrap();

        fn check(seeds: &[&[u8]], program_id: &Pubkey, expected: &str) {
            let address = create_program_address(seeds, program_id).unwrap();
            assert_eq!(address.to_string(), expected);
        }

        check(&[b"", &[1]], &program_id, "BwqrghZA2htAcqq8dzP1WDAhTXYTYWj7CHxF5j7TDBAe");
        check(&["\u{2609}".as_bytes(), &[0]], &program_id, "13yWmRpaTR4r5nAktwLqMpRNr28tnVUZw26rTvPSSB19");
        check(&[b"Talking", b"Squirrels"], &program_id, "2fnQrngrQT4SeLcdToJAD96phoEjNL2man2kfRLCASVk");
        check(&[seed_key.as_ref(), &[1]], &program_id, "976ymqVnfE32QFe6NfGDctSvVa36LWnvYxhU6G2232YL");
    }
}
