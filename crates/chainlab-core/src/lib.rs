//! Proof-of-work mining and chain validation.
//!
//! A [`Chain`] starts with a mined genesis block and grows by mining candidate
//! [`Block`]s onto its tip. [`Chain::validate`] sweeps the whole sequence and
//! reports the first broken invariant.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod election;
pub mod error;
pub mod mine;
pub mod pow;
pub mod survey;

pub use block::{digest, now_millis, Block};
pub use chain::{Chain, Slot, Validation, Violation};
pub use config::ChainConfig;
pub use error::{ChainError, Result};
pub use mine::{race, Contender, RaceOutcome};
pub use pow::{MiningControl, MiningResult, Progress};
pub use survey::{survey, SurveyRow};

#[cfg(feature = "tamper")]
pub use chain::Tamper;
