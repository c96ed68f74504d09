//! Plain-text rendering of engine results.

use chainlab_core::{
    election::{self, Consensus, Tally},
    Chain, MiningResult, SurveyRow, Validation,
};

pub fn print_chain(chain: &Chain) {
    for block in chain.blocks() {
        println!("\nBlock #{}", block.index());
        println!("  Timestamp:     {}", block.timestamp());
        println!("  Data:          {}", block.payload());
        println!("  Previous hash: {}", block.previous_hash());
        println!("  Hash:          {}", block.hash());
        println!("  Nonce:         {}", block.nonce());
        println!("  Difficulty:    {}", block.difficulty());
    }
}

pub fn validation_line(validation: &Validation) -> String {
    match validation {
        Validation::Valid => "valid".to_string(),
        Validation::Invalid { at_index, reason } => {
            format!("INVALID at block {at_index}: {reason} ({reason:?})")
        }
    }
}

pub fn mining_line(result: &MiningResult) -> String {
    format!(
        "nonce {} after {} attempts in {} ms",
        result.nonce,
        result.attempts,
        result.elapsed_millis()
    )
}

pub fn print_survey(rows: &[SurveyRow]) {
    println!("Difficulty | Attempts (mean) | Expected | Time ms (mean)");
    println!("-----------+-----------------+----------+---------------");
    for row in rows {
        println!(
            "{:>10} | {:>15.1} | {:>8.0} | {:>14.2}",
            row.difficulty, row.mean_attempts, row.expected_attempts, row.mean_elapsed_ms
        );
    }
    println!("\nEach extra zero makes a block about 16x harder to mine.");
}

pub fn print_weights(participants: &[(&str, f64)], unit: &str) {
    let total: f64 = participants.iter().map(|(_, w)| w).sum();
    for ((name, weight), share) in participants
        .iter()
        .zip(election::probabilities(participants))
    {
        println!("  {name:<16} {weight:>10.1} {unit:<6} {:>5.1}%", share * 100.0);
    }
    println!("  {:<16} {total:>10.1} {unit}", "total");
}

pub fn print_tally(tally: &[Tally], active: usize) {
    println!("\nVoting results:");
    for (rank, entry) in tally.iter().enumerate() {
        let status = match rank {
            0 => " (block producer)",
            r if r < active => " (standby)",
            _ => "",
        };
        println!("  {}. {}: {} votes{status}", rank + 1, entry.delegate, entry.votes);
    }
}

pub fn print_comparison() {
    println!("\n{:<18}| {:<16}| {:<16}| {:<16}", "Aspect", "PoW", "PoS", "DPoS");
    println!("{}", "-".repeat(70));
    let profiles = Consensus::ALL.map(|c| c.profile());
    let rows: [(&str, fn(&election::Profile) -> &'static str); 6] = [
        ("Energy use", |p| p.energy_use),
        ("Block time", |p| p.block_time),
        ("Scalability", |p| p.scalability),
        ("Security", |p| p.security),
        ("Decentralization", |p| p.decentralization),
        ("Attack needs", |p| p.attack),
    ];
    for (aspect, field) in rows {
        println!(
            "{aspect:<18}| {:<16}| {:<16}| {:<16}",
            field(&profiles[0]),
            field(&profiles[1]),
            field(&profiles[2])
        );
    }
    for consensus in Consensus::ALL {
        println!(
            "{:<5} e.g. {}",
            consensus.short_name(),
            consensus.profile().examples.join(", ")
        );
    }
}
