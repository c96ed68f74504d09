use chainlab_core::{Chain, ChainConfig};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Debug, Serialize)]
pub struct Transfer {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
}

pub fn transfer(sender: &str, receiver: &str, amount: u64) -> Transfer {
    Transfer {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        amount,
    }
}

pub fn config_with(genesis_payload: Value, genesis_difficulty: u32) -> ChainConfig {
    ChainConfig {
        genesis_payload,
        genesis_difficulty,
        ..ChainConfig::default()
    }
}

/// A chain of `len` blocks (genesis included) carrying transfer payloads.
pub fn create_chain(len: usize, difficulty: u32) -> Chain {
    let mut chain = Chain::from_config(&config_with(json!("Genesis Block"), difficulty))
        .expect("Failed to create chain");
    let people = ["Alice", "Bob", "Charlie"];
    for i in 1..len {
        let payload = transfer(people[i % 3], people[(i + 1) % 3], 10 * i as u64);
        chain.append_payload(&payload).expect("Failed to append block");
    }
    chain
}
