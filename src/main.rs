//! cue-sim — drive a CUE network for a number of ticks
//!
//! Usage:
//!   cue-sim --peers 7 --steps 100 --state-dir ./cue-state
//!
//! Every peer hosts one agent and one two-domain entity. Without
//! `--state-dir` the peers live in memory; with it they persist and resume.

use clap::Parser;
use cue_core::SynthesisConfig;
use cue_network::{CryptoProvider, CueNetwork, CuePeer, Ed25519Crypto, LocalFsStore, MemoryStore, SnapshotStore};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Domains of the entity each peer tracks besides its agent.
const ENTITY_DOMAINS: [(&str, u64); 2] = [("daily", 3), ("weekly", 5)];

#[derive(Parser)]
#[command(name = "cue-sim", about = "Deterministic CUE network simulation")]
struct Cli {
    /// Path to config file (TOML). Missing or invalid files fall back to defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist peer snapshots under this directory.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 50)]
    steps: u64,

    /// Number of peers. Fewer than seven pads consensus with mock validators.
    #[arg(long, default_value_t = 7)]
    peers: usize,

    /// Override the simulation seed from the config.
    #[arg(long)]
    seed: Option<u64>,

    /// Run a consensus round every N ticks (0 disables).
    #[arg(long, default_value_t = 10)]
    consensus_every: u64,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        print!("{}", SynthesisConfig::default().to_toml());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &cli.config {
        Some(path) => SynthesisConfig::load(path),
        None => SynthesisConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.simulation.seed = seed;
    }

    let store: Arc<dyn SnapshotStore> = match &cli.state_dir {
        Some(dir) => {
            info!("Persisting peers under {}", dir.display());
            Arc::new(LocalFsStore::new(dir))
        }
        None => Arc::new(MemoryStore::new()),
    };
    let crypto: Arc<dyn CryptoProvider> = Arc::new(Ed25519Crypto::new());

    let entity_domains: BTreeMap<String, u64> = ENTITY_DOMAINS.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    let mut network = CueNetwork::new(&config);
    for i in 0..cli.peers {
        let mut peer = CuePeer::open(format!("peer-{}.json", i), store.clone(), crypto.clone(), config.clone())?;
        peer.initialize_entity(&format!("entity-{}", i), &entity_domains)?;
        peer.host_agent(&format!("agent-{}", i))?;
        network.add_peer(peer)?;
    }

    if cli.consensus_every > 0 {
        if cli.peers >= 7 {
            network.initialize_consensus()?;
        } else {
            network.initialize_consensus_with_mock_validators()?;
        }
    }

    info!("Running {} ticks over {} peers", cli.steps, cli.peers);
    for _ in 0..cli.steps {
        let report = network.simulation_step()?;
        if report.resonances > 0 || report.rules_learned > 0 {
            info!(
                "Tick {}: {} resonances, {} rules learned",
                report.tick, report.resonances, report.rules_learned
            );
        }
        if cli.consensus_every > 0 && report.tick % cli.consensus_every == 0 {
            let quorum = network.run_consensus_round(&format!("tick-{}", report.tick))?;
            info!("Tick {}: quorum line {}", report.tick, quorum.line);
        }
    }

    println!("{}", serde_json::to_string_pretty(&network.get_stats())?);
    Ok(())
}
