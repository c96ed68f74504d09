//! Deliberate corruption of sealed blocks, for demonstrating and testing
//! validation. Only compiled with the `tamper` feature.

use serde::Serialize;
use tracing::warn;

use super::Chain;
use crate::block::{canonical_payload, Block};
use crate::error::Result;

/// Write access to sealed blocks. Obtained through [`Chain::tamper`].
#[derive(Debug)]
pub struct Tamper<'a> {
    chain: &'a mut Chain,
}

impl Chain {
    pub fn tamper(&mut self) -> Tamper<'_> {
        Tamper { chain: self }
    }
}

impl Tamper<'_> {
    /// Replaces the payload and leaves the stored hash untouched.
    pub fn overwrite_payload(&mut self, index: u64, payload: impl Serialize) -> Result<()> {
        let payload = serde_json::to_value(payload)?;
        let block = self.block_mut(index)?;
        block.canonical = canonical_payload(&payload);
        block.payload = payload;
        warn!(index, "payload overwritten without rehash");
        Ok(())
    }

    /// Points the block somewhere else and rehashes it, so the block stays
    /// self-consistent while the link is broken.
    pub fn overwrite_previous_hash(
        &mut self,
        index: u64,
        previous_hash: impl Into<String>,
    ) -> Result<()> {
        let block = self.block_mut(index)?;
        block.previous_hash = previous_hash.into();
        block.rehash();
        warn!(index, "previous hash overwritten");
        Ok(())
    }

    pub fn overwrite_hash(&mut self, index: u64, hash: impl Into<String>) -> Result<()> {
        let block = self.block_mut(index)?;
        block.hash = hash.into();
        warn!(index, "stored hash overwritten");
        Ok(())
    }

    fn block_mut(&mut self, index: u64) -> Result<&mut Block> {
        let position = self.chain.position(index)?;
        Ok(&mut self.chain.blocks[position])
    }
}
