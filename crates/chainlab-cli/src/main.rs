mod report;

use anyhow::{Context, Result};
use chainlab_core::{
    election::{self, Ballot},
    now_millis, race, survey, Chain, ChainConfig, Contender,
};
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "chainlab-cli")]
#[command(about = "Proof-of-work mining, tamper detection and leader election walkthroughs")]
struct Cli {
    /// Log engine events (mined blocks, validation failures) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON chain configuration; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine a short chain of transfers, list it and validate it
    Demo {
        /// Difficulty for genesis and every following block
        #[arg(long)]
        difficulty: Option<u32>,
        /// Transfers mined after genesis
        #[arg(long, default_value_t = 3)]
        blocks: usize,
        /// Print the chain and validation result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Corrupt a block, then fix the chain the quick way and the right way
    Tamper {
        #[arg(long)]
        difficulty: Option<u32>,
    },
    /// Compare mining cost across difficulties
    Survey {
        #[arg(long, value_delimiter = ',', default_value = "1,2,3")]
        difficulties: Vec<u32>,
        /// Blocks mined per difficulty
        #[arg(long, default_value_t = 1)]
        trials: u32,
        #[arg(long)]
        json: bool,
    },
    /// Let several miners compete for the next block
    Race {
        #[arg(long)]
        difficulty: Option<u32>,
    },
    /// Pick block producers by hash power, stake and delegate vote
    Consensus {
        /// Seed for the random draws; omit for a fresh run
        #[arg(long)]
        seed: Option<u64>,
    },
}

const MINERS: [(&str, f64); 5] = [
    ("BigMining Corp", 120.5),
    ("CryptoFarm LLC", 89.2),
    ("HashPower Inc", 201.7),
    ("DigitalMiner Co", 156.3),
    ("BlockDigger Ltd", 93.8),
];

const VALIDATORS: [(&str, f64); 5] = [
    ("Alice", 15_000.0),
    ("Bob", 32_000.0),
    ("Charlie", 8_500.0),
    ("Diana", 41_000.0),
    ("Eve", 19_500.0),
];

const DELEGATES: [&str; 5] = [
    "Community Pool",
    "Tech Foundation",
    "Innovation Lab",
    "Future Chain",
    "Crypto Alliance",
];

const VOTERS: [(&str, u64); 7] = [
    ("Investor_A", 5_000),
    ("Investor_B", 3_200),
    ("Investor_C", 8_100),
    ("Investor_D", 2_800),
    ("Investor_E", 6_500),
    ("Investor_F", 4_200),
    ("Investor_G", 7_300),
];

const TRANSFERS: [(&str, &str, u64); 3] = [
    ("Alice", "Bob", 50),
    ("Bob", "Charlie", 25),
    ("Charlie", "Alice", 10),
];

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::ERROR
    };
    fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref())?;
    match cli.cmd {
        Command::Demo {
            difficulty,
            blocks,
            json,
        } => demo(with_difficulty(config, difficulty), blocks, json),
        Command::Tamper { difficulty } => tamper(with_difficulty(config, difficulty)),
        Command::Survey {
            difficulties,
            trials,
            json,
        } => run_survey(&difficulties, trials, json),
        Command::Race { difficulty } => run_race(with_difficulty(config, difficulty)),
        Command::Consensus { seed } => consensus(seed),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ChainConfig> {
    match path {
        Some(path) => ChainConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ChainConfig::default()),
    }
}

fn with_difficulty(mut config: ChainConfig, difficulty: Option<u32>) -> ChainConfig {
    if let Some(difficulty) = difficulty {
        config.genesis_difficulty = difficulty;
    }
    config
}

fn transfer(index: usize) -> serde_json::Value {
    let (sender, receiver, amount) = TRANSFERS[index % TRANSFERS.len()];
    json!({ "sender": sender, "receiver": receiver, "amount": amount })
}

fn build_chain(config: &ChainConfig, transfers: usize) -> Result<Chain> {
    let mut chain = Chain::from_config(config).context("creating chain")?;
    for i in 0..transfers {
        chain
            .append_payload(transfer(i))
            .with_context(|| format!("mining block {}", i + 1))?;
    }
    Ok(chain)
}

#[derive(Serialize)]
struct ChainReport<'a> {
    difficulty: u32,
    blocks: &'a [chainlab_core::Block],
    validation: chainlab_core::Validation,
}

fn demo(config: ChainConfig, transfers: usize, as_json: bool) -> Result<()> {
    let chain = build_chain(&config, transfers)?;
    let validation = chain.validate();
    if as_json {
        let report = ChainReport {
            difficulty: chain.difficulty(),
            blocks: chain.blocks(),
            validation,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Mined {} blocks at difficulty {}",
        chain.len(),
        chain.difficulty()
    );
    report::print_chain(&chain);
    println!("\nChain check: {}", report::validation_line(&validation));
    Ok(())
}

fn tamper(config: ChainConfig) -> Result<()> {
    let mut chain = build_chain(&config, TRANSFERS.len())?;
    println!("Chain check: {}", report::validation_line(&chain.validate()));

    let original = chain.blocks()[1].payload().clone();
    let forged = json!({ "sender": "Alice", "receiver": "Eve", "amount": 500 });
    println!("\nOverwriting block 1 without rehashing");
    println!("  before: {original}");
    println!("  after:  {forged}");
    chain.tamper().overwrite_payload(1, &forged)?;
    println!("Chain check: {}", report::validation_line(&chain.validate()));

    println!("\nShortcut: rehash block 1 and relink everything after it, no mining");
    chain.repair(1)?;
    println!("Chain check: {}", report::validation_line(&chain.validate()));

    println!("\nRe-mining blocks 1..{} at their original difficulty", chain.len() - 1);
    for (offset, result) in chain.remine_from(1)?.iter().enumerate() {
        println!("  block {}: {}", offset + 1, report::mining_line(result));
    }
    println!("Chain check: {}", report::validation_line(&chain.validate()));
    println!("\nChanging any block means re-mining every block after it.");
    Ok(())
}

fn run_survey(difficulties: &[u32], trials: u32, as_json: bool) -> Result<()> {
    let rows = survey(difficulties, trials, now_millis()).context("running difficulty survey")?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        report::print_survey(&rows);
    }
    Ok(())
}

fn run_race(config: ChainConfig) -> Result<()> {
    let mut chain = Chain::from_config(&config).context("creating chain")?;
    let slot = chain.snapshot();
    println!(
        "{} miners compete for block {} at difficulty {}",
        MINERS.len(),
        slot.index,
        slot.difficulty
    );

    let timestamp = now_millis();
    let contenders = MINERS
        .iter()
        .map(|(name, _)| -> Result<Contender> {
            let block = slot.candidate(timestamp, json!({ "miner": name }))?;
            Ok(Contender::new(*name, block))
        })
        .collect::<Result<Vec<_>>>()?;

    let outcome = race(&slot, contenders)?;
    println!(
        "{} wins: {}",
        outcome.winner,
        report::mining_line(&outcome.result)
    );
    println!("Discarded work from: {}", outcome.abandoned.join(", "));
    chain.commit(outcome.block)?;
    info!(length = chain.len(), "race winner committed");
    println!("Chain check: {}", report::validation_line(&chain.validate()));
    Ok(())
}

fn consensus(seed: Option<u64>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!("=== Proof of Work: chance follows hash power ===");
    report::print_weights(&MINERS, "TH/s");
    let pow_winner = election::select_weighted(&MINERS, &mut rng)
        .context("no miner with hash power")?;
    println!("Winner: {pow_winner}");

    println!("\n=== Proof of Stake: chance follows stake ===");
    report::print_weights(&VALIDATORS, "tokens");
    let pos_winner = election::select_weighted(&VALIDATORS, &mut rng)
        .context("no validator with stake")?;
    println!("Selected: {pos_winner}");

    println!("\n=== Delegated Proof of Stake: token holders vote ===");
    let delegates: Vec<String> = DELEGATES.iter().map(|d| d.to_string()).collect();
    let ballots: Vec<Ballot> = VOTERS
        .iter()
        .map(|(voter, balance)| Ballot::random(*voter, *balance, &delegates, 2, &mut rng))
        .collect();
    for ballot in &ballots {
        println!(
            "{} ({} tokens) votes for {}",
            ballot.voter,
            ballot.weight,
            ballot.choices.join(" and ")
        );
    }
    let tally = election::tally_votes(&delegates, &ballots);
    let active = election::active_delegates(&tally, 3);
    report::print_tally(&tally, active.len());
    let producer = active.first().context("no delegates")?;

    println!("\n=== Summary ===");
    println!("PoW winner:  {pow_winner}");
    println!("PoS winner:  {pos_winner}");
    println!("DPoS winner: {} ({} votes)", producer.delegate, producer.votes);
    report::print_comparison();
    Ok(())
}
