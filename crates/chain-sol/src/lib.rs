//! Solana primitives for the declarative transaction resolver.
//!
//! Addresses, keypairs, program derived addresses, instruction types and
//! Anchor discriminators, implemented directly on `ed25519-dalek`,
//! `curve25519-dalek`, `sha2` and `bs58` rather than through `solana-sdk`
//! (which drags in tokio and 200+ transitive dependencies).

pub mod address;
pub mod error;
pub mod instruction;
pub mod keypair;
pub mod pda;
pub mod programs;
pub mod sighash;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, bytes_to_address, validate_address, Address, ADDRESS_LEN};
pub use error::SolError;
pub use instruction::{AccountMeta, Instruction};
pub use keypair::{Keypair, KEYPAIR_LEN};
pub use pda::{
    check_seeds, create_program_address, find_program_address, is_on_curve, MAX_SEEDS,
    MAX_SEED_LEN,
};
pub use programs::WELL_KNOWN;
pub use sighash::{namespaced_sighash, sighash, to_snake_case, SIGHASH_LEN};
