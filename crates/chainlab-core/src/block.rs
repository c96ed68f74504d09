use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::constants::MAX_DIFFICULTY;
use crate::error::{ChainError, Result};
use crate::pow::{self, MiningControl, MiningResult};

/// Milliseconds since the Unix epoch, or 0 if the clock reads before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Canonical text of a payload: compact JSON with object keys in sorted order.
///
/// `serde_json::Map` is ordered as long as the `preserve_order` feature stays off,
/// so two values that compare equal always produce the same bytes.
pub fn canonical_payload(payload: &Value) -> String {
    payload.to_string()
}

/// The single hash function of the engine. Mining and validation both go through it.
pub fn digest(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    payload: &Value,
    nonce: u64,
) -> String {
    digest_canonical(
        index,
        previous_hash,
        timestamp,
        &canonical_payload(payload),
        nonce,
    )
}

pub(crate) fn digest_canonical(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    payload: &str,
    nonce: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update((previous_hash.len() as u64).to_le_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher.update(timestamp.to_le_bytes());
    hasher.update((payload.len() as u64).to_le_bytes());
    hasher.update(payload.as_bytes());
    hasher.update(nonce.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// A chain entry. Starts as a candidate (nonce 0) and becomes sealed once
/// [`Block::mine`] finds a qualifying hash. Fields are only readable from outside
/// the crate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) timestamp: u64,
    pub(crate) payload: Value,
    pub(crate) previous_hash: String,
    pub(crate) hash: String,
    pub(crate) nonce: u64,
    /// Target the block was sealed for; 0 while it is still a candidate.
    pub(crate) difficulty: u32,
    #[serde(skip)]
    pub(crate) canonical: String,
}

impl Block {
    pub fn new(
        index: u64,
        timestamp: u64,
        payload: impl Serialize,
        previous_hash: impl Into<String>,
    ) -> Result<Self> {
        let payload = serde_json::to_value(payload)?;
        Ok(Self::from_value(index, timestamp, payload, previous_hash.into()))
    }

    pub(crate) fn from_value(
        index: u64,
        timestamp: u64,
        payload: Value,
        previous_hash: String,
    ) -> Self {
        let canonical = canonical_payload(&payload);
        let mut block = Self {
            index,
            timestamp,
            payload,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            difficulty: 0,
            canonical,
        };
        block.hash = block.recompute_hash();
        block
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Fresh digest of the current fields. Does not touch the stored hash.
    pub fn recompute_hash(&self) -> String {
        digest_canonical(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.canonical,
            self.nonce,
        )
    }

    /// True when the stored hash matches the fields and meets `difficulty`.
    pub fn is_sealed_for(&self, difficulty: u32) -> bool {
        pow::meets_difficulty(&self.hash, difficulty) && self.hash == self.recompute_hash()
    }

    pub fn mine(&mut self, difficulty: u32) -> Result<MiningResult> {
        self.mine_with(difficulty, &MiningControl::default())
    }

    /// Increments the nonce until the hash has `difficulty` leading hex zeros.
    ///
    /// Unbounded in time; stop it through the control's cancellation flag. A
    /// cancelled block is left unsealed and should be discarded.
    pub fn mine_with(
        &mut self,
        difficulty: u32,
        control: &MiningControl<'_>,
    ) -> Result<MiningResult> {
        pow::check_difficulty(difficulty, MAX_DIFFICULTY)?;
        let started = Instant::now();
        let mut attempts = 0u64;

        while !pow::meets_difficulty(&self.hash, difficulty) {
            if control.is_cancelled() {
                return Err(ChainError::Cancelled { attempts });
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.recompute_hash();
            attempts += 1;
            control.report(attempts, self.nonce, &self.hash);
        }

        self.difficulty = difficulty;
        let result = MiningResult {
            nonce: self.nonce,
            attempts,
            elapsed: started.elapsed(),
        };
        info!(
            index = self.index,
            nonce = self.nonce,
            attempts,
            difficulty,
            hash = %self.hash,
            "block mined"
        );
        Ok(result)
    }

    pub(crate) fn relink(&mut self, previous_hash: &str) {
        if self.previous_hash != previous_hash {
            self.previous_hash = previous_hash.to_string();
            self.hash = self.recompute_hash();
        }
    }

    pub(crate) fn rehash(&mut self) {
        self.hash = self.recompute_hash();
    }
}
