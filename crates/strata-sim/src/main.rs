//! strata-sim: randomized end-to-end simulation of the distribution engine.
//!
//! Drives an in-process chain (in-memory staking and bank, in-memory or SQLite
//! ledger store) through random blocks and operations, checking every ledger
//! invariant along the way, and prints a JSON summary on success.

mod config;
mod operations;

use std::path::Path;

use strata_distribution::testing::TestChain;
use strata_store::{KvStore, MemStore, SqliteStore};
use tracing::info;

use crate::config::SimConfig;
use crate::operations::Simulation;

fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = SimConfig::load()?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("strata={}", config.logging.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(seed = config.simulation.seed, blocks = config.simulation.blocks, "strata-sim starting");

    // 3. Open the ledger store
    let store: Box<dyn KvStore> = if config.storage.db_path.is_empty() {
        Box::new(MemStore::new())
    } else {
        // Staking state is in-memory, so a previous run's ledger cannot be resumed.
        if Path::new(&config.storage.db_path).exists() {
            anyhow::bail!("{} already exists; the simulator needs a fresh database", config.storage.db_path);
        }
        info!("Opening ledger database at {}", config.storage.db_path);
        Box::new(SqliteStore::open(Path::new(&config.storage.db_path))?)
    };

    // 4. Genesis
    let chain = TestChain::with_store(store, &config.params)?;
    let mut sim = Simulation::new(chain, config.simulation.clone());
    sim.genesis()?;

    // 5. Run
    sim.run()?;

    let summary = sim.summary()?;
    info!(height = summary.height, rejected = summary.stats.rejected, "simulation finished");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
