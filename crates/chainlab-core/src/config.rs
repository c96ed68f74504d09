use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::Path};

use crate::constants::{
    DEFAULT_MAX_DIFFICULTY, GENESIS_PAYLOAD, MAX_DIFFICULTY, POW_TARGET_DIFFICULTY,
    PROGRESS_INTERVAL,
};
use crate::error::{ChainError, Result};
use crate::pow;

/// Chain settings. Every field has a default, so a config file only needs the
/// values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub genesis_payload: Value,
    pub genesis_difficulty: u32,
    /// Highest difficulty the chain accepts; never above the digest width.
    pub max_difficulty: u32,
    pub progress_interval: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_payload: Value::String(GENESIS_PAYLOAD.to_string()),
            genesis_difficulty: POW_TARGET_DIFFICULTY,
            max_difficulty: DEFAULT_MAX_DIFFICULTY,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl ChainConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ChainError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_difficulty > MAX_DIFFICULTY {
            return Err(ChainError::Config(format!(
                "max_difficulty {} exceeds the {MAX_DIFFICULTY} hex digits of a hash",
                self.max_difficulty
            )));
        }
        if self.progress_interval == 0 {
            return Err(ChainError::Config(
                "progress_interval must be at least 1".to_string(),
            ));
        }
        pow::check_difficulty(self.genesis_difficulty, self.max_difficulty)
    }
}
