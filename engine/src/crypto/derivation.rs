//! # Program-Derived Addresses
//!
//! Token balances on the rail don't live at the wallet address. They live in
//! an *associated token account* whose address is derived from
//! `(owner, token program, mint)`. To check whether an author was paid in a
//! token we must recompute that address from on-chain-visible data alone.
//!
//! The derivation is the rail's standard one:
//!
//! ```text
//! for bump in 255..=0:
//!     candidate = sha256(seed_0 ‖ … ‖ seed_n ‖ [bump] ‖ program_id ‖ "ProgramDerivedAddress")
//!     if candidate is NOT a valid compressed Edwards point: return (candidate, bump)
//! ```
//!
//! Off-curve is the whole point: nobody holds a private key for the result,
//! so only the owning program can move funds out of it.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::address::Address;
use crate::config::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// Domain separator appended to every derivation hash.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum number of seeds in one derivation.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Errors from address derivation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error("too many seeds: {0} (max {MAX_SEEDS})")]
    TooManySeeds(usize),

    #[error("seed {index} is {len} bytes (max {MAX_SEED_LEN})")]
    SeedTooLong { index: usize, len: usize },

    /// Astronomically unlikely: all 256 bumps landed on the curve.
    #[error("no off-curve address found for these seeds")]
    NoViableBump,
}

/// Returns true if `bytes` decompress to a point on the Ed25519 curve.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

/// Compute a program address for one specific bump.
///
/// Returns `None` when the candidate lands on the curve.
fn create_program_address(seeds: &[&[u8]], bump: u8, program_id: &Address) -> Option<Address> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);

    let digest: [u8; 32] = hasher.finalize().into();
    if is_on_curve(&digest) {
        None
    } else {
        Some(Address::new(digest))
    }
}

/// Find the canonical program address for `seeds` under `program_id`.
///
/// The canonical bump is the highest one that yields an off-curve address.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), DerivationError> {
    // One slot is reserved for the bump itself.
    if seeds.len() >= MAX_SEEDS {
        return Err(DerivationError::TooManySeeds(seeds.len()));
    }
    if let Some((index, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(DerivationError::SeedTooLong {
            index,
            len: seed.len(),
        });
    }

    (0..=u8::MAX)
        .rev()
        .find_map(|bump| create_program_address(seeds, bump, program_id).map(|addr| (addr, bump)))
        .ok_or(DerivationError::NoViableBump)
}

/// Derive the associated token account holding `mint` for `owner`.
pub fn associated_token_address(owner: &Address, mint: &Address) -> Result<Address, DerivationError> {
    let seeds: [&[u8]; 3] = [
        owner.as_bytes(),
        TOKEN_PROGRAM_ID.as_bytes(),
        mint.as_bytes(),
    ];
    find_program_address(&seeds, &ASSOCIATED_TOKEN_PROGRAM_ID).map(|(addr, _)| addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USDT_MINT;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn derived_token_account_matches_reference_vector() {
        let owner = Address::new([7u8; 32]);
        let ata = associated_token_address(&owner, &USDT_MINT).unwrap();
        assert_eq!(ata.to_string(), "MnVorf8KKPzHgQpa6exLfKpam8YkTn8WpeUuuFwgsob");
    }

    #[test]
    fn derivation_is_deterministic() {
        let owner = Address::new(SigningKey::generate(&mut OsRng).verifying_key().to_bytes());
        let a = associated_token_address(&owner, &USDT_MINT).unwrap();
        let b = associated_token_address(&owner, &USDT_MINT).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derived_address_is_off_curve() {
        let owner = Address::new([42u8; 32]);
        let (addr, _) = find_program_address(&[owner.as_bytes()], &ASSOCIATED_TOKEN_PROGRAM_ID).unwrap();
        assert!(!is_on_curve(addr.as_bytes()));
        assert!(addr.verifying_key().is_err());
    }

    #[test]
    fn different_mints_give_different_accounts() {
        let owner = Address::new([9u8; 32]);
        let other_mint = Address::new([3u8; 32]);
        assert_ne!(
            associated_token_address(&owner, &USDT_MINT).unwrap(),
            associated_token_address(&owner, &other_mint).unwrap()
        );
    }

    #[test]
    fn wallet_keys_are_on_curve() {
        let key = SigningKey::generate(&mut OsRng).verifying_key().to_bytes();
        assert!(is_on_curve(&key));
    }

    #[test]
    fn rejects_oversized_seed() {
        let long = [0u8; 33];
        assert_eq!(
            find_program_address(&[&long], &ASSOCIATED_TOKEN_PROGRAM_ID),
            Err(DerivationError::SeedTooLong { index: 0, len: 33 })
        );
    }

    #[test]
    fn rejects_too_many_seeds() {
        let seed = [1u8; 4];
        let seeds: Vec<&[u8]> = (0..16).map(|_| &seed[..]).collect();
        assert_eq!(
            find_program_address(&seeds, &ASSOCIATED_TOKEN_PROGRAM_ID),
            Err(DerivationError::TooManySeeds(16))
        );
    }
}
