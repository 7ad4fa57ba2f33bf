//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each
//! `(run token, agent id)` pair. Sub-seeds are derived via BLAKE3
//! hashing, independently of thread scheduling order, so a training run
//! produces identical per-agent randomness regardless of worker count.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::AgentId;

/// Hash-derived seed tree rooted at a master seed.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for `(run_token, agent)`.
    ///
    /// Derivation is order-independent: the sub-seed for any agent is the
    /// same no matter which other agents were derived before it.
    pub fn sub_seed(&self, run_token: &str, agent: &AgentId) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(run_token.as_bytes());
        hasher.update(agent.0.as_bytes());
        let hash = hasher.finalize();
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap())
    }

    /// Create a seeded `StdRng` for `(run_token, agent)`.
    pub fn rng_for(&self, run_token: &str, agent: &AgentId) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(run_token, agent))
    }
}
