pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Previous-hash marker carried by block 0.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_PAYLOAD: &str = "Genesis Block";

/// A difficulty is a count of leading hex zeros, so it can never exceed the digest width.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const DEFAULT_MAX_DIFFICULTY: u32 = 8;
pub const POW_TARGET_DIFFICULTY: u32 = 2;

/// Attempts between two progress reports while mining.
pub const PROGRESS_INTERVAL: u64 = 50_000;

/// Nonces handed to the thread pool per round of a parallel search.
pub const PARALLEL_BATCH: u64 = 1 << 16;
