//! Difficulty policy and mining controls.
//!
//! A difficulty `d` means the hex digest must start with `d` zero characters, i.e.
//! the top `4 * d` bits of the SHA-256 output are zero.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::constants::{MAX_DIFFICULTY, PROGRESS_INTERVAL};
use crate::error::{ChainError, Result};

/// Number of leading `'0'` characters in a hex digest.
pub fn count_leading_zeros(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    count_leading_zeros(hash) >= difficulty
}

/// The zero prefix a sealed hash must start with.
pub fn target_prefix(difficulty: u32) -> String {
    "0".repeat(difficulty as usize)
}

/// Mean number of hashes needed to hit `difficulty`: each hex digit is 4 bits.
pub fn expected_attempts(difficulty: u32) -> f64 {
    16f64.powi(difficulty as i32)
}

/// Rejects a difficulty above `max` (and always above the digest width).
pub fn check_difficulty(difficulty: u32, max: u32) -> Result<()> {
    let max = max.min(MAX_DIFFICULTY);
    if difficulty > max {
        return Err(ChainError::InvalidDifficulty { difficulty, max });
    }
    Ok(())
}

/// Outcome of a successful nonce search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MiningResult {
    pub nonce: u64,
    /// Hashes computed after the initial one.
    pub attempts: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl MiningResult {
    pub fn elapsed_millis(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

fn serialize_millis<S: Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Snapshot handed to a progress callback. Informational only.
#[derive(Debug)]
pub struct Progress {
    pub attempts: u64,
    pub nonce: u64,
    pub hash: String,
}

type ProgressFn<'a> = &'a (dyn Fn(&Progress) + Sync);

/// Optional hooks for a running search: a periodic progress callback and a
/// cooperative cancellation flag.
#[derive(Clone, Copy)]
pub struct MiningControl<'a> {
    cancel: Option<&'a AtomicBool>,
    progress: Option<ProgressFn<'a>>,
    progress_interval: u64,
}

impl Default for MiningControl<'_> {
    fn default() -> Self {
        Self {
            cancel: None,
            progress: None,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl<'a> MiningControl<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the search as soon as `flag` reads `true`.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn on_progress(mut self, callback: ProgressFn<'a>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Report progress every `interval` attempts. Zero is treated as one.
    pub fn every(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub(crate) fn report(&self, attempts: u64, nonce: u64, hash: &str) {
        if attempts % self.progress_interval == 0 {
            self.report_now(attempts, nonce, hash);
        }
    }

    /// Reports regardless of the interval.
    pub(crate) fn report_now(&self, attempts: u64, nonce: u64, hash: &str) {
        if let Some(callback) = self.progress {
            callback(&Progress {
                attempts,
                nonce,
                hash: hash.to_string(),
            });
        }
    }
}

impl std::fmt::Debug for MiningControl<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningControl")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}
