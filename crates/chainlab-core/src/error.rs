use thiserror::Error;

use crate::chain::Violation;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("invalid difficulty {difficulty}: must be at most {max}")]
    InvalidDifficulty { difficulty: u32, max: u32 },

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("nonce space exhausted without meeting the target")]
    NonceSpaceExhausted,

    #[error("a race needs at least one contender")]
    NoContenders,

    #[error("block index {index} out of range (chain length {len})")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("block rejected: {reason}")]
    Rejected { reason: Violation },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
