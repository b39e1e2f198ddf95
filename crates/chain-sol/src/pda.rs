//! Program derived addresses.
//!
//! A PDA is `SHA-256(seed_0 || ... || seed_n || bump || program_id ||
//! "ProgramDerivedAddress")`, accepted only when the digest does NOT
//! decompress to a point on the Ed25519 curve. The canonical bump is the
//! first one, searching from 255 down to 0, that yields an off-curve digest.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::SolError;

/// Longest accepted seed, in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Most seeds accepted by one derivation, bump included.
pub const MAX_SEEDS: usize = 16;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Check a seed list against the runtime limits.
///
/// The bump seed appended by [`find_program_address`] counts towards
/// [`MAX_SEEDS`].
pub fn check_seeds(seeds: &[&[u8]]) -> Result<(), SolError> {
    if seeds.len() >= MAX_SEEDS {
        return Err(SolError::TooManySeeds(seeds.len()));
    }
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(SolError::SeedTooLong {
                index,
                len: seed.len(),
                max: MAX_SEED_LEN,
            });
        }
    }
    Ok(())
}

/// Find the canonical program derived address and its bump seed.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), SolError> {
    check_seeds(seeds)?;

    for bump in (0u8..=255).rev() {
        if let Some(address) = try_create_program_address(seeds, &[bump], program_id) {
            return Ok((address, bump));
        }
    }

    Err(SolError::DerivationFailed(
        "could not find valid PDA bump seed".into(),
    ))
}

/// Derive a program address from seeds that already include the bump.
///
/// Fails when the digest lands on the curve.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<Address, SolError> {
    let (last, rest) = seeds
        .split_last()
        .ok_or_else(|| SolError::DerivationFailed("no seeds given".into()))?;
    if seeds.len() > MAX_SEEDS {
        return Err(SolError::TooManySeeds(seeds.len()));
    }
    check_seeds(rest)?;
    try_create_program_address(rest, last, program_id)
        .ok_or_else(|| SolError::DerivationFailed("derived address lies on the curve".into()))
}

fn try_create_program_address(
    seeds: &[&[u8]],
    bump_seed: &[u8],
    program_id: &Address,
) -> Option<Address> {
    let mut hasher = Sha256::new();

    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(bump_seed);
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return None;
    }

    Some(Address::new(hash))
}

/// Check if 32 bytes represent a valid Ed25519 curve point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
