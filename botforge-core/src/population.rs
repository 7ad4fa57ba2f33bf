//! Agent population — fixed-size, created once, reused across runs.
//!
//! Identities are derived deterministically from a population seed, so
//! `id` values are stable and unique and generation order carries no
//! meaning. The only mutation entry point is
//! [`apply_training_result`](AgentPopulation::apply_training_result),
//! called serially by the training orchestrator's aggregator.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Agent, AgentId, Grade, Performance, Tier};

/// Default army size.
pub const DEFAULT_POPULATION_SIZE: usize = 5_000;

const NAME_PREFIXES: [&str; 5] = ["ProBot", "GoldHunter", "TradeMaster", "Warrior", "ForgeBot"];
const NAME_SUFFIXES: [&str; 6] = ["Elite", "Pro", "Master", "X", "Alpha", "Prime"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PopulationError {
    #[error("population must contain at least one agent")]
    Empty,
    #[error("duplicate agent id {0}")]
    DuplicateAgent(AgentId),
    #[error("unknown agent id {0}")]
    UnknownAgent(AgentId),
}

/// Outcome of one agent's training step, produced by a worker and applied
/// by the aggregator. Carries the full replacement performance (not an
/// increment), so applying it is idempotent per agent per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDelta {
    pub performance: Performance,
    /// Post-promotion tier decided by the promotion engine.
    pub tier: Tier,
    pub trained_at: NaiveDateTime,
}

/// What an applied delta changed, for aggregate accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedTraining {
    pub tier_before: Tier,
    pub tier_after: Tier,
    pub grade_before: Grade,
    pub grade_after: Grade,
}

/// Census of the population by tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub standard: usize,
    pub elite: usize,
    pub godmode: usize,
}

/// The fixed-size collection of agents.
#[derive(Debug, Clone)]
pub struct AgentPopulation {
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
}

impl AgentPopulation {
    /// Initialize `size` agents with identities derived from `seed`.
    pub fn new(size: usize, seed: u64) -> Result<Self, PopulationError> {
        let agents = (0..size)
            .map(|i| Agent {
                id: derive_id(seed, i as u64),
                name: derive_name(i),
                tier: Tier::Standard,
                performance: Performance::default(),
                last_trained_at: None,
            })
            .collect();
        Self::from_agents(agents)
    }

    /// Build a population from pre-constructed agents (tests, custom seeds).
    pub fn from_agents(agents: Vec<Agent>) -> Result<Self, PopulationError> {
        if agents.is_empty() {
            return Err(PopulationError::Empty);
        }
        let mut index = HashMap::with_capacity(agents.len());
        for (i, agent) in agents.iter().enumerate() {
            if index.insert(agent.id.clone(), i).is_some() {
                return Err(PopulationError::DuplicateAgent(agent.id.clone()));
            }
        }
        Ok(Self { agents, index })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.index.get(id).map(|&i| &self.agents[i])
    }

    /// Apply one training outcome. The sole mutation entry point.
    ///
    /// Invariant: tier never decreases. The stored tier is the max of
    /// the current tier and the delta's, so a stale or malformed delta
    /// cannot demote an agent mid-run.
    pub fn apply_training_result(
        &mut self,
        id: &AgentId,
        delta: TrainingDelta,
    ) -> Result<AppliedTraining, PopulationError> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| PopulationError::UnknownAgent(id.clone()))?;
        let agent = &mut self.agents[slot];

        let tier_before = agent.tier;
        let grade_before = agent.performance.grade();

        agent.performance = delta.performance;
        agent.tier = agent.tier.max(delta.tier);
        agent.last_trained_at = Some(delta.trained_at);

        Ok(AppliedTraining {
            tier_before,
            tier_after: agent.tier,
            grade_before,
            grade_after: agent.performance.grade(),
        })
    }

    pub fn tier_counts(&self) -> TierCounts {
        let mut counts = TierCounts::default();
        for agent in &self.agents {
            match agent.tier {
                Tier::Standard => counts.standard += 1,
                Tier::Elite => counts.elite += 1,
                Tier::Godmode => counts.godmode += 1,
            }
        }
        counts
    }

    pub fn count_at_or_above(&self, tier: Tier) -> usize {
        self.agents.iter().filter(|a| a.tier >= tier).count()
    }

    /// Top `n` agents by performance score, ties broken by `id` ordering
    /// (never by completion order).
    pub fn top_performers(&self, n: usize) -> Vec<&Agent> {
        let mut ranked: Vec<&Agent> = self.agents.iter().collect();
        ranked.sort_by(|a, b| {
            b.performance
                .score()
                .partial_cmp(&a.performance.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(n);
        ranked
    }
}

fn derive_id(seed: u64, index: u64) -> AgentId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(&index.to_le_bytes());
    let hash = hasher.finalize();
    AgentId::new(hash.to_hex()[..16].to_string())
}

fn derive_name(index: usize) -> String {
    let prefix = NAME_PREFIXES[index % NAME_PREFIXES.len()];
    let suffix = NAME_SUFFIXES[(index / 100) % NAME_SUFFIXES.len()];
    format!("{prefix}-{:04}-{suffix}", index + 1)
}
