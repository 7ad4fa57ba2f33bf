//! Serializable training configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use botforge_core::data::ParserConfig;
use botforge_core::population::DEFAULT_POPULATION_SIZE;
use botforge_core::promotion::PromotionPolicy;

/// Configuration for the import/training pipeline.
///
/// Captures everything needed to reproduce a run: population identity
/// seed, training master seed, worker-pool size, batching, progress
/// cadence, parser limits, and promotion thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of agents in the army.
    pub population_size: usize,

    /// Seed for deriving stable agent identities.
    pub population_seed: u64,

    /// Master seed for per-agent training randomness.
    pub master_seed: u64,

    /// Worker pool size; 0 means available parallelism.
    pub worker_threads: usize,

    /// Agents dispatched per batch. Cancellation is observed between
    /// batches, so this bounds how much work starts after a cancel.
    pub batch_size: usize,

    /// Minimum interval between emitted progress snapshots, in ms.
    pub progress_min_interval_ms: u64,

    /// Parser limits (input size cap, error sample cap).
    pub parser: ParserConfig,

    /// Tier promotion thresholds.
    pub promotion: PromotionPolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            population_size: DEFAULT_POPULATION_SIZE,
            population_seed: 1,
            master_seed: 42,
            worker_threads: 0,
            batch_size: 128,
            progress_min_interval_ms: 50,
            parser: ParserConfig::default(),
            promotion: PromotionPolicy::default(),
        }
    }
}

impl TrainingConfig {
    /// Parse a TOML document into a config.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        Self::from_toml(&raw)
    }

    /// Deterministic content hash of this configuration.
    ///
    /// Two identical configs share a hash, so reports tagged with it can
    /// be compared across runs.
    pub fn config_id(&self) -> String {
        let json = serde_json::to_string(self).expect("TrainingConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("cannot read config {0}: {1}")]
    Io(String, String),
}
