//! Simulator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_types::Params;

/// Environment variable naming the config file to load.
pub const CONFIG_ENV: &str = "STRATA_SIM_CONFIG";

/// Config file looked up in the working directory when the env var is unset.
const DEFAULT_CONFIG_FILE: &str = "strata-sim.toml";

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Run shape.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Distribution params the chain is initialized with.
    #[serde(default)]
    pub params: Params,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// RNG seed. Same seed, same run.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_blocks")]
    pub blocks: u64,
    /// Check every invariant after this many blocks. 0 = only at the end.
    #[serde(default = "default_invariant_period")]
    pub invariant_period: u64,
    /// Validators created at genesis.
    #[serde(default = "default_validators")]
    pub validators: u32,
    /// Delegator accounts available to operations.
    #[serde(default = "default_delegators")]
    pub delegators: u32,
    /// Upper bound on fees collected per block.
    #[serde(default = "default_max_fee")]
    pub max_fee: u64,
    /// Upper bound on random operations per block.
    #[serde(default = "default_ops_per_block")]
    pub ops_per_block: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Empty = in-memory store.
    #[serde(default)]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_seed() -> u64 {
    42
}

fn default_blocks() -> u64 {
    500
}

fn default_invariant_period() -> u64 {
    50
}

fn default_validators() -> u32 {
    5
}

fn default_delegators() -> u32 {
    20
}

fn default_max_fee() -> u64 {
    10_000
}

fn default_ops_per_block() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            blocks: default_blocks(),
            invariant_period: default_invariant_period(),
            validators: default_validators(),
            delegators: default_delegators(),
            max_fee: default_max_fee(),
            ops_per_block: default_ops_per_block(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl SimConfig {
    /// Load from `$STRATA_SIM_CONFIG`, else `./strata-sim.toml`.
    ///
    /// Falls back to defaults if neither file exists.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config = Self::from_toml(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.params.validate()?;
        Ok(config)
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}
