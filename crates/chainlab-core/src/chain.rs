use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::block::{now_millis, Block};
use crate::config::ChainConfig;
use crate::constants::GENESIS_PREVIOUS_HASH;
use crate::error::{ChainError, Result};
use crate::pow::{self, MiningControl, MiningResult, Progress};

#[cfg(any(test, feature = "tamper"))]
mod tamper;
#[cfg(any(test, feature = "tamper"))]
pub use tamper::Tamper;

/// Why a block fails validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Violation {
    /// Stored hash differs from a fresh digest of the block's fields.
    HashMismatch,
    /// Previous hash does not point at the preceding block (or the genesis sentinel).
    BrokenLink,
    /// Hash lacks the leading zeros of the difficulty it was sealed for.
    DifficultyNotMet,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::HashMismatch => write!(f, "hash mismatch"),
            Violation::BrokenLink => write!(f, "broken link"),
            Violation::DifficultyNotMet => write!(f, "difficulty not met"),
        }
    }
}

/// Result of a full chain sweep. Validation never fails, it reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validation {
    Valid,
    Invalid { at_index: u64, reason: Violation },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// What a miner needs to compete for the next position: captured once, shared by
/// every competitor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub index: u64,
    pub previous_hash: String,
    pub difficulty: u32,
}

impl Slot {
    /// A candidate for this slot, already linked to the captured tip.
    pub fn candidate(&self, timestamp: u64, payload: impl serde::Serialize) -> Result<Block> {
        Block::new(self.index, timestamp, payload, self.previous_hash.clone())
    }
}

/// Append-only sequence of sealed blocks. Always holds at least the genesis block.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    config: ChainConfig,
}

impl Chain {
    /// A chain whose genesis block is mined at `genesis_difficulty`, which also
    /// becomes the difficulty for the following blocks.
    pub fn new(genesis_difficulty: u32) -> Result<Self> {
        let config = ChainConfig {
            genesis_difficulty,
            ..ChainConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        config.validate()?;

        let mut genesis = Block::from_value(
            0,
            now_millis(),
            config.genesis_payload.clone(),
            GENESIS_PREVIOUS_HASH.to_string(),
        );
        let control = MiningControl::new()
            .on_progress(&log_progress)
            .every(config.progress_interval);
        genesis.mine_with(config.genesis_difficulty, &control)?;
        info!(
            difficulty = config.genesis_difficulty,
            hash = %genesis.hash(),
            "genesis block sealed"
        );

        Ok(Self {
            blocks: vec![genesis],
            difficulty: config.genesis_difficulty,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Changes the target for future appends only.
    pub fn set_difficulty(&mut self, difficulty: u32) -> Result<()> {
        pow::check_difficulty(difficulty, self.config.max_difficulty)?;
        if difficulty != self.difficulty {
            info!(from = self.difficulty, to = difficulty, "difficulty changed");
        }
        self.difficulty = difficulty;
        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: genesis is created with the chain.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn latest(&self) -> &Block {
        // The vector starts with genesis and is never shrunk.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Links `candidate` to the tip, mines it at the current difficulty and
    /// appends it. Any previous hash the caller set is overwritten.
    pub fn append(&mut self, candidate: Block) -> Result<MiningResult> {
        let control = MiningControl::new()
            .on_progress(&log_progress)
            .every(self.config.progress_interval);
        self.append_with(candidate, &control)
    }

    pub fn append_with(
        &mut self,
        mut candidate: Block,
        control: &MiningControl<'_>,
    ) -> Result<MiningResult> {
        let tip = self.latest().hash().to_string();
        candidate.relink(&tip);
        let result = candidate.mine_with(self.difficulty, control)?;
        info!(
            index = candidate.index(),
            length = self.blocks.len() + 1,
            "block appended"
        );
        self.blocks.push(candidate);
        Ok(result)
    }

    /// Builds a candidate at the next index, stamped with the current time, and appends it.
    pub fn append_payload(&mut self, payload: impl serde::Serialize) -> Result<MiningResult> {
        let candidate = Block::new(
            self.blocks.len() as u64,
            now_millis(),
            payload,
            self.latest().hash(),
        )?;
        self.append(candidate)
    }

    /// Captures the tip and difficulty for miners racing on the next position.
    pub fn snapshot(&self) -> Slot {
        Slot {
            index: self.blocks.len() as u64,
            previous_hash: self.latest().hash().to_string(),
            difficulty: self.difficulty,
        }
    }

    /// Appends a block that was mined elsewhere, after checking it extends the tip
    /// and is sealed for the current difficulty. The block records the chain
    /// difficulty, whatever its own search aimed for.
    pub fn commit(&mut self, mut block: Block) -> Result<()> {
        let rejected = if block.index() != self.blocks.len() as u64
            || block.previous_hash() != self.latest().hash()
        {
            Some(Violation::BrokenLink)
        } else if block.hash() != block.recompute_hash() {
            Some(Violation::HashMismatch)
        } else if !block.is_sealed_for(self.difficulty) {
            Some(Violation::DifficultyNotMet)
        } else {
            None
        };

        if let Some(reason) = rejected {
            warn!(index = block.index(), %reason, "block rejected");
            return Err(ChainError::Rejected { reason });
        }
        block.difficulty = self.difficulty;
        info!(index = block.index(), hash = %block.hash(), "block committed");
        self.blocks.push(block);
        Ok(())
    }

    /// Sweeps the chain once in order and stops at the first violation.
    pub fn validate(&self) -> Validation {
        for (i, block) in self.blocks.iter().enumerate() {
            if let Some(reason) = self.violation_at(i, block) {
                warn!(index = i, %reason, "chain validation failed");
                return Validation::Invalid {
                    at_index: i as u64,
                    reason,
                };
            }
        }
        debug!(length = self.blocks.len(), "chain valid");
        Validation::Valid
    }

    fn violation_at(&self, i: usize, block: &Block) -> Option<Violation> {
        if i == 0 && (block.index() != 0 || block.previous_hash() != GENESIS_PREVIOUS_HASH) {
            return Some(Violation::BrokenLink);
        }
        if block.hash() != block.recompute_hash() {
            return Some(Violation::HashMismatch);
        }
        if i > 0 && block.previous_hash() != self.blocks[i - 1].hash() {
            return Some(Violation::BrokenLink);
        }
        if !pow::meets_difficulty(block.hash(), block.difficulty()) {
            return Some(Violation::DifficultyNotMet);
        }
        None
    }

    /// Rehashes the block at `index` and relinks and rehashes every block after it,
    /// without mining. The result is internally linked but generally no longer meets
    /// the recorded difficulties; use [`Chain::remine_from`] to reseal properly.
    pub fn repair(&mut self, index: u64) -> Result<()> {
        let start = self.position(index)?;
        for i in start..self.blocks.len() {
            if i > 0 {
                let previous = self.blocks[i - 1].hash().to_string();
                self.blocks[i].previous_hash = previous;
            }
            self.blocks[i].rehash();
        }
        warn!(from = index, "chain rehashed without mining");
        Ok(())
    }

    /// Replaces every block from `index` to the tip with a freshly mined one that
    /// keeps the original index, timestamp and payload and is sealed for the
    /// difficulty the original was sealed for.
    pub fn remine_from(&mut self, index: u64) -> Result<Vec<MiningResult>> {
        let start = self.position(index)?;
        let mut results = Vec::with_capacity(self.blocks.len() - start);
        for i in start..self.blocks.len() {
            let previous_hash = if i == 0 {
                GENESIS_PREVIOUS_HASH.to_string()
            } else {
                self.blocks[i - 1].hash().to_string()
            };
            let old = &self.blocks[i];
            let difficulty = old.difficulty();
            let mut candidate =
                Block::from_value(old.index(), old.timestamp(), old.payload().clone(), previous_hash);
            results.push(candidate.mine(difficulty)?);
            self.blocks[i] = candidate;
        }
        info!(from = index, count = results.len(), "blocks re-mined");
        Ok(results)
    }

    fn position(&self, index: u64) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.blocks.len())
            .ok_or(ChainError::IndexOutOfRange {
                index,
                len: self.blocks.len() as u64,
            })
    }
}

fn log_progress(progress: &Progress) {
    debug!(
        attempts = progress.attempts,
        nonce = progress.nonce,
        hash = %progress.hash,
        "mining"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain_of(len: usize, difficulty: u32) -> Chain {
        let mut chain = Chain::new(difficulty).unwrap();
        for i in 1..len {
            chain
                .append_payload(json!({"sender": "Alice", "receiver": "Bob", "amount": i}))
                .unwrap();
        }
        chain
    }

    #[test]
    fn genesis_is_sealed() {
        let chain = Chain::new(1).unwrap();
        let genesis = chain.latest();
        assert_eq!(chain.len(), 1);
        assert!(!chain.is_empty());
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), "0");
        assert_eq!(genesis.payload(), &json!("Genesis Block"));
        assert!(genesis.hash().starts_with('0'));
        assert!(genesis.is_sealed_for(1));
        assert_eq!(chain.validate(), Validation::Valid);
    }

    #[test]
    fn genesis_difficulty_above_ceiling_is_rejected() {
        let err = Chain::new(9).unwrap_err();
        assert!(matches!(err, ChainError::InvalidDifficulty { difficulty: 9, max: 8 }));
    }

    #[test]
    fn append_links_and_mines() {
        let mut chain = Chain::new(1).unwrap();
        let candidate = Block::new(1, 1_000, json!({"a": 1}), "caller supplied").unwrap();
        let result = chain.append(candidate).unwrap();
        let block = chain.latest();
        assert_eq!(chain.len(), 2);
        assert_eq!(block.previous_hash(), chain.blocks()[0].hash());
        assert_eq!(block.nonce(), result.nonce);
        assert!(block.is_sealed_for(1));
        assert!(chain.validate().is_valid());
    }

    #[test]
    fn difficulty_change_only_affects_future_blocks() {
        let mut chain = chain_of(2, 1);
        chain.set_difficulty(2).unwrap();
        chain.append_payload("harder").unwrap();
        assert_eq!(chain.blocks()[1].difficulty(), 1);
        assert_eq!(chain.blocks()[2].difficulty(), 2);
        assert!(chain.blocks()[2].hash().starts_with("00"));
        chain.set_difficulty(0).unwrap();
        chain.append_payload("easy").unwrap();
        assert!(chain.validate().is_valid());
    }

    #[test]
    fn set_difficulty_rejects_values_above_ceiling() {
        let mut chain = Chain::new(0).unwrap();
        assert!(matches!(
            chain.set_difficulty(9),
            Err(ChainError::InvalidDifficulty { difficulty: 9, max: 8 })
        ));
        assert_eq!(chain.difficulty(), 0);
    }

    #[test]
    fn tampered_payload_is_a_hash_mismatch() {
        let mut chain = chain_of(4, 1);
        chain
            .tamper()
            .overwrite_payload(1, json!({"sender": "Alice", "receiver": "Eve", "amount": 500}))
            .unwrap();
        assert_eq!(
            chain.validate(),
            Validation::Invalid {
                at_index: 1,
                reason: Violation::HashMismatch
            }
        );
    }

    #[test]
    fn rewritten_previous_hash_is_a_broken_link() {
        let mut chain = chain_of(3, 1);
        chain
            .tamper()
            .overwrite_previous_hash(2, "deadbeef")
            .unwrap();
        assert_eq!(chain.blocks()[2].hash(), chain.blocks()[2].recompute_hash());
        assert_eq!(
            chain.validate(),
            Validation::Invalid {
                at_index: 2,
                reason: Violation::BrokenLink
            }
        );
    }

    #[test]
    fn genesis_sentinel_is_checked() {
        let mut chain = chain_of(2, 0);
        chain.tamper().overwrite_previous_hash(0, "1").unwrap();
        assert_eq!(
            chain.validate(),
            Validation::Invalid {
                at_index: 0,
                reason: Violation::BrokenLink
            }
        );
    }

    #[test]
    fn overwritten_hash_is_detected() {
        let mut chain = chain_of(2, 1);
        let forged = format!("0{}", "f".repeat(63));
        chain.tamper().overwrite_hash(1, forged).unwrap();
        assert_eq!(
            chain.validate(),
            Validation::Invalid {
                at_index: 1,
                reason: Violation::HashMismatch
            }
        );
    }

    #[test]
    fn validation_stops_at_first_violation() {
        let mut chain = chain_of(4, 1);
        chain.tamper().overwrite_payload(2, "late").unwrap();
        chain.tamper().overwrite_payload(1, "early").unwrap();
        assert_eq!(
            chain.validate(),
            Validation::Invalid {
                at_index: 1,
                reason: Violation::HashMismatch
            }
        );
    }

    #[test]
    fn repair_relinks_without_mining() {
        let mut chain = chain_of(4, 3);
        chain.tamper().overwrite_payload(1, "forged").unwrap();
        chain.repair(1).unwrap();
        for i in 1..4 {
            let block = &chain.blocks()[i];
            assert_eq!(block.hash(), block.recompute_hash());
            assert_eq!(block.previous_hash(), chain.blocks()[i - 1].hash());
        }
        // Rehashing with the old nonce is overwhelmingly unlikely to keep three zeros.
        match chain.validate() {
            Validation::Valid => {}
            Validation::Invalid { reason, .. } => assert_eq!(reason, Violation::DifficultyNotMet),
        }
    }

    #[test]
    fn cascading_repair_then_remine_restores_validity() {
        let mut chain = chain_of(4, 1);
        chain.tamper().overwrite_payload(1, json!({"amount": 500})).unwrap();
        assert!(!chain.validate().is_valid());

        chain.repair(1).unwrap();
        let results = chain.remine_from(1).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(chain.validate(), Validation::Valid);
        assert_eq!(chain.blocks()[1].payload(), &json!({"amount": 500}));
        for block in &chain.blocks()[1..] {
            assert!(block.is_sealed_for(1));
        }
    }

    #[test]
    fn remine_keeps_original_difficulties() {
        let mut chain = chain_of(2, 1);
        chain.set_difficulty(2).unwrap();
        chain.append_payload("two zeros").unwrap();
        chain.set_difficulty(0).unwrap();
        chain.remine_from(0).unwrap();
        assert_eq!(chain.blocks()[0].difficulty(), 1);
        assert_eq!(chain.blocks()[2].difficulty(), 2);
        assert!(chain.blocks()[2].hash().starts_with("00"));
        assert!(chain.validate().is_valid());
    }

    #[test]
    fn repair_rejects_out_of_range_index() {
        let mut chain = chain_of(2, 0);
        assert!(matches!(
            chain.repair(5),
            Err(ChainError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert!(chain.remine_from(2).is_err());
    }

    #[test]
    fn commit_accepts_block_mined_for_snapshot() {
        let mut chain = chain_of(2, 1);
        let slot = chain.snapshot();
        assert_eq!(slot.index, 2);
        let mut block = slot.candidate(5, "external").unwrap();
        block.mine(slot.difficulty).unwrap();
        chain.commit(block).unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.validate().is_valid());
    }

    #[test]
    fn commit_rejects_stale_or_unsealed_blocks() {
        let mut chain = chain_of(1, 1);
        let slot = chain.snapshot();

        let unsealed = slot.candidate(5, "lazy").unwrap();
        if !unsealed.hash().starts_with('0') {
            assert!(matches!(
                chain.commit(unsealed),
                Err(ChainError::Rejected {
                    reason: Violation::DifficultyNotMet
                })
            ));
        }

        let mut first = slot.candidate(6, "first").unwrap();
        first.mine(1).unwrap();
        let mut second = slot.candidate(7, "second").unwrap();
        second.mine(1).unwrap();
        chain.commit(first).unwrap();
        assert!(matches!(
            chain.commit(second),
            Err(ChainError::Rejected {
                reason: Violation::BrokenLink
            })
        ));
        assert_eq!(chain.len(), 2);
    }

    /// An unmined candidate whose nonce-0 hash already meets `slot.difficulty`.
    fn lucky_candidate(slot: &Slot) -> Block {
        (0u64..)
            .map(|ts| slot.candidate(ts, "lucky").unwrap())
            .find(|block| block.is_sealed_for(slot.difficulty))
            .unwrap()
    }

    #[test]
    fn commit_records_chain_difficulty() {
        let mut chain = chain_of(1, 1);
        let lucky = lucky_candidate(&chain.snapshot());
        assert_eq!(lucky.difficulty(), 0);
        assert_eq!(lucky.nonce(), 0);

        chain.commit(lucky).unwrap();
        assert_eq!(chain.latest().difficulty(), chain.difficulty());

        let mut overshoot = chain.snapshot().candidate(9, "overshoot").unwrap();
        overshoot.mine(2).unwrap();
        chain.commit(overshoot).unwrap();
        assert_eq!(chain.latest().difficulty(), 1);
        assert!(chain.validate().is_valid());
    }

    #[test]
    fn committed_block_keeps_its_difficulty_through_tamper_and_remine() {
        let mut chain = chain_of(1, 1);
        chain.commit(lucky_candidate(&chain.snapshot())).unwrap();
        chain.set_difficulty(2).unwrap();

        chain
            .tamper()
            .overwrite_payload(1, &json!("forged"))
            .unwrap();
        chain.repair(1).unwrap();
        if !chain.latest().hash().starts_with('0') {
            assert_eq!(
                chain.validate(),
                Validation::Invalid {
                    at_index: 1,
                    reason: Violation::DifficultyNotMet
                }
            );
        }

        let results = chain.remine_from(1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(chain.latest().difficulty(), 1);
        assert!(chain.latest().is_sealed_for(1));
        assert_eq!(chain.latest().payload(), &json!("forged"));
        assert!(chain.validate().is_valid());
    }

    #[test]
    fn concrete_scenario() {
        let config = ChainConfig {
            genesis_payload: json!("Genesis"),
            genesis_difficulty: 1,
            ..ChainConfig::default()
        };
        let mut chain = Chain::from_config(&config).unwrap();
        assert!(chain.latest().hash().starts_with('0'));

        chain.append_payload(json!({"a": 1})).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.validate(), Validation::Valid);

        chain.tamper().overwrite_payload(1, json!({"a": 2})).unwrap();
        assert_eq!(
            chain.validate(),
            Validation::Invalid {
                at_index: 1,
                reason: Violation::HashMismatch
            }
        );
    }

    #[test]
    fn validation_serializes_with_status_tag() {
        let invalid = Validation::Invalid {
            at_index: 1,
            reason: Violation::HashMismatch,
        };
        assert_eq!(
            serde_json::to_string(&invalid).unwrap(),
            r#"{"status":"invalid","at_index":1,"reason":"HashMismatch"}"#
        );
        assert_eq!(
            serde_json::to_string(&Validation::Valid).unwrap(),
            r#"{"status":"valid"}"#
        );
    }
}
