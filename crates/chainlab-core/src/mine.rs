use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::info;

use crate::block::{digest_canonical, Block};
use crate::chain::Slot;
use crate::constants::{MAX_DIFFICULTY, PARALLEL_BATCH};
use crate::error::{ChainError, Result};
use crate::pow::{self, MiningControl, MiningResult};

impl Block {
    /// Searches nonces on the rayon pool, one batch at a time, and keeps the
    /// smallest qualifying nonce at or after the current one. The sealed block is
    /// therefore identical to what [`Block::mine`] produces.
    pub fn mine_parallel(&mut self, difficulty: u32) -> Result<MiningResult> {
        self.mine_parallel_with(difficulty, &MiningControl::new())
    }

    /// [`Block::mine_parallel`] with hooks. The cancel flag is checked and progress
    /// is reported between batches, so both have batch granularity.
    pub fn mine_parallel_with(
        &mut self,
        difficulty: u32,
        control: &MiningControl<'_>,
    ) -> Result<MiningResult> {
        pow::check_difficulty(difficulty, MAX_DIFFICULTY)?;
        let started = Instant::now();
        let start = self.nonce;

        let found = {
            let (index, timestamp) = (self.index, self.timestamp);
            let previous_hash = self.previous_hash.as_str();
            let payload = self.canonical.as_str();
            let mut base = start;
            loop {
                if control.is_cancelled() {
                    return Err(ChainError::Cancelled {
                        attempts: base - start,
                    });
                }
                let end = base.saturating_add(PARALLEL_BATCH);
                let hit = (base..end).into_par_iter().find_first(|nonce| {
                    let hash = digest_canonical(index, previous_hash, timestamp, payload, *nonce);
                    pow::meets_difficulty(&hash, difficulty)
                });
                if let Some(nonce) = hit {
                    break nonce;
                }
                if end == u64::MAX {
                    return Err(ChainError::NonceSpaceExhausted);
                }
                let last = end - 1;
                let hash = digest_canonical(index, previous_hash, timestamp, payload, last);
                control.report_now(end - start, last, &hash);
                base = end;
            }
        };

        self.nonce = found;
        self.hash = self.recompute_hash();
        self.difficulty = difficulty;
        info!(
            index = self.index,
            nonce = found,
            difficulty,
            hash = %self.hash,
            "block mined in parallel"
        );
        Ok(MiningResult {
            nonce: found,
            attempts: found - start,
            elapsed: started.elapsed(),
        })
    }
}

/// A named miner and the candidate it works on.
#[derive(Clone, Debug)]
pub struct Contender {
    pub name: String,
    pub block: Block,
}

impl Contender {
    pub fn new(name: impl Into<String>, block: Block) -> Self {
        Self {
            name: name.into(),
            block,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RaceOutcome {
    pub winner: String,
    pub block: Block,
    pub result: MiningResult,
    /// Contenders whose search was cancelled or finished second.
    pub abandoned: Vec<String>,
}

/// Competing miners for one slot. Every contender is linked to the slot's
/// previous hash and mined at its difficulty on the rayon pool; the first to
/// finish cancels the others. Losing work is dropped. Build candidates with
/// [`Slot::candidate`] so the winner can be passed to `Chain::commit`.
pub fn race(slot: &Slot, contenders: Vec<Contender>) -> Result<RaceOutcome> {
    pow::check_difficulty(slot.difficulty, MAX_DIFFICULTY)?;
    if contenders.is_empty() {
        return Err(ChainError::NoContenders);
    }

    let finished = AtomicBool::new(false);
    let outcomes = contenders
        .into_par_iter()
        .map(|Contender { name, mut block }| {
            block.relink(&slot.previous_hash);
            let control = MiningControl::new().with_cancel(&finished);
            let won = match block.mine_with(slot.difficulty, &control) {
                Ok(result) => (!finished.swap(true, Ordering::AcqRel)).then_some((block, result)),
                Err(ChainError::Cancelled { .. }) => None,
                Err(e) => return Err(e),
            };
            Ok((name, won))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut winner = None;
    let mut abandoned = Vec::new();
    for (name, won) in outcomes {
        match won {
            Some((block, result)) => winner = Some((name, block, result)),
            None => abandoned.push(name),
        }
    }
    let (winner, block, result) = winner.ok_or(ChainError::NoContenders)?;
    info!(
        %winner,
        index = block.index(),
        nonce = result.nonce,
        abandoned = abandoned.len(),
        "race won"
    );
    Ok(RaceOutcome {
        winner,
        block,
        result,
        abandoned,
    })
}
