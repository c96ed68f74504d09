//! Leader selection for the consensus comparison: weighted draws (hash power or
//! stake) and delegate voting. Nothing in the chain depends on this module.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Picks one participant with probability proportional to its weight.
///
/// Draws `r` uniformly from `[0, total)` and returns the first participant whose
/// cumulative weight exceeds `r`. Participants with a weight that is not
/// positive are never chosen. `None` when nobody has positive weight.
pub fn select_weighted<'a, T, R: Rng>(
    participants: &'a [(T, f64)],
    rng: &mut R,
) -> Option<&'a T> {
    let eligible = || {
        participants
            .iter()
            .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
    };
    let total: f64 = eligible().map(|(_, weight)| weight).sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }

    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for (participant, weight) in eligible() {
        cumulative += weight;
        if draw < cumulative {
            return Some(participant);
        }
    }
    // Float rounding can leave the draw a hair above the last cumulative sum.
    eligible().last().map(|(participant, _)| participant)
}

/// Share of the total weight held by each participant, in input order.
pub fn probabilities<T>(participants: &[(T, f64)]) -> Vec<f64> {
    let total: f64 = participants.iter().map(|(_, w)| w.max(0.0)).sum();
    participants
        .iter()
        .map(|(_, w)| if total > 0.0 { w.max(0.0) / total } else { 0.0 })
        .collect()
}

/// A voter's token-weighted support for one or more delegates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ballot {
    pub voter: String,
    pub weight: u64,
    pub choices: Vec<String>,
}

impl Ballot {
    /// Supports between one and `max_choices` distinct delegates, chosen at random.
    pub fn random<R: Rng>(
        voter: impl Into<String>,
        weight: u64,
        delegates: &[String],
        max_choices: usize,
        rng: &mut R,
    ) -> Self {
        let upper = max_choices.min(delegates.len());
        let count = if upper == 0 { 0 } else { rng.gen_range(1..=upper) };
        let choices = delegates.choose_multiple(rng, count).cloned().collect();
        Self {
            voter: voter.into(),
            weight,
            choices,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub delegate: String,
    pub votes: u64,
}

/// Sums ballot weights per delegate. Every delegate appears, even with zero
/// votes; choices naming unknown delegates are ignored and a delegate named twice
/// on one ballot counts once. Sorted by votes, highest first, ties by name.
pub fn tally_votes(delegates: &[String], ballots: &[Ballot]) -> Vec<Tally> {
    let mut votes: BTreeMap<&str, u64> = delegates.iter().map(|d| (d.as_str(), 0)).collect();
    for ballot in ballots {
        let distinct: BTreeSet<&str> = ballot.choices.iter().map(String::as_str).collect();
        for choice in distinct {
            if let Some(total) = votes.get_mut(choice) {
                *total = total.saturating_add(ballot.weight);
            }
        }
    }

    let mut tally: Vec<Tally> = votes
        .into_iter()
        .map(|(delegate, votes)| Tally {
            delegate: delegate.to_string(),
            votes,
        })
        .collect();
    tally.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.delegate.cmp(&b.delegate)));
    tally
}

/// The top `n` of a sorted tally. The first entry produces the next block, the
/// rest stand by.
pub fn active_delegates(tally: &[Tally], n: usize) -> &[Tally] {
    &tally[..n.min(tally.len())]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Consensus {
    ProofOfWork,
    ProofOfStake,
    DelegatedProofOfStake,
}

/// Qualitative trade-offs of a consensus mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub energy_use: &'static str,
    pub block_time: &'static str,
    pub scalability: &'static str,
    pub security: &'static str,
    pub decentralization: &'static str,
    pub attack: &'static str,
    pub examples: &'static [&'static str],
}

impl Consensus {
    pub const ALL: [Consensus; 3] = [
        Consensus::ProofOfWork,
        Consensus::ProofOfStake,
        Consensus::DelegatedProofOfStake,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            Consensus::ProofOfWork => "PoW",
            Consensus::ProofOfStake => "PoS",
            Consensus::DelegatedProofOfStake => "DPoS",
        }
    }

    pub fn profile(&self) -> Profile {
        match self {
            Consensus::ProofOfWork => Profile {
                energy_use: "Very High",
                block_time: "Slow (~10min)",
                scalability: "Limited",
                security: "Highest",
                decentralization: "Good",
                attack: "51% of hash power",
                examples: &["Bitcoin", "Litecoin"],
            },
            Consensus::ProofOfStake => Profile {
                energy_use: "Very Low",
                block_time: "Fast (~6sec)",
                scalability: "Better",
                security: "High",
                decentralization: "Good",
                attack: "51% of stake, slashed if caught",
                examples: &["Ethereum", "Cardano", "Polkadot"],
            },
            Consensus::DelegatedProofOfStake => Profile {
                energy_use: "Very Low",
                block_time: "Fastest (~3sec)",
                scalability: "Best",
                security: "Good",
                decentralization: "Questionable",
                attack: "control of the top delegates",
                examples: &["EOS", "Tron", "BitShares"],
            },
        }
    }
}
