use thiserror::Error;

/// Solana primitive errors.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("seed {index} is {len} bytes, the limit is {max}")]
    SeedTooLong { index: usize, len: usize, max: usize },

    #[error("too many seeds: {0}")]
    TooManySeeds(usize),

    #[error("program derived address error: {0}")]
    DerivationFailed(String),
}
