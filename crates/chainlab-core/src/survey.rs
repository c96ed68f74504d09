use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::block::Block;
use crate::error::Result;
use crate::pow;

/// Index and previous hash of the throwaway blocks a survey mines.
const SURVEY_INDEX: u64 = 999;
const SURVEY_PREVIOUS_HASH: &str = "test123";

/// Mining cost measured at one difficulty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurveyRow {
    pub difficulty: u32,
    pub trials: u32,
    pub mean_attempts: f64,
    pub mean_elapsed_ms: f64,
    pub expected_attempts: f64,
}

/// Mines `trials` test blocks per difficulty and averages the cost. Trial `t`
/// uses timestamp `base_timestamp + t` (wrapping), so a fixed base gives reproducible
/// attempt counts.
pub fn survey(difficulties: &[u32], trials: u32, base_timestamp: u64) -> Result<Vec<SurveyRow>> {
    let trials = trials.max(1);
    let mut rows = Vec::with_capacity(difficulties.len());

    for &difficulty in difficulties {
        let mut attempts = 0u64;
        let mut elapsed_ms = 0f64;
        for trial in 0..trials {
            let mut block = Block::new(
                SURVEY_INDEX,
                base_timestamp.wrapping_add(u64::from(trial)),
                json!({ "test": format!("difficulty_{difficulty}") }),
                SURVEY_PREVIOUS_HASH,
            )?;
            let result = block.mine(difficulty)?;
            attempts += result.attempts;
            elapsed_ms += result.elapsed.as_secs_f64() * 1_000.0;
        }

        let row = SurveyRow {
            difficulty,
            trials,
            mean_attempts: attempts as f64 / f64::from(trials),
            mean_elapsed_ms: elapsed_ms / f64::from(trials),
            expected_attempts: pow::expected_attempts(difficulty),
        };
        info!(
            difficulty,
            trials,
            mean_attempts = row.mean_attempts,
            "difficulty surveyed"
        );
        rows.push(row);
    }
    Ok(rows)
}
