//! BotForge Core — bar parsing, import sessions, quality scoring, agent
//! population, and tier promotion.
//!
//! This crate contains the leaf components of the ingestion/training
//! pipeline:
//! - Domain types (historical bars, agents, tiers, performance)
//! - Tolerant streaming CSV parser with per-row error recovery
//! - Import session state machine (Idle → Parsing → Validating → Ready)
//! - Pure data-quality scoring
//! - Fixed-size agent population with a single mutation entry point
//! - Pure, monotonic tier promotion engine
//! - Rate-limited progress reporter
//! - Deterministic BLAKE3-derived RNG hierarchy

pub mod data;
pub mod domain;
pub mod population;
pub mod progress;
pub mod promotion;
pub mod rng;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything that crosses the worker-thread
    /// boundary is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::HistoricalBar>();
        require_sync::<domain::HistoricalBar>();
        require_send::<domain::Agent>();
        require_sync::<domain::Agent>();
        require_send::<domain::AgentId>();
        require_sync::<domain::AgentId>();
        require_send::<domain::Tier>();
        require_sync::<domain::Tier>();
        require_send::<domain::Performance>();
        require_sync::<domain::Performance>();

        // Data pipeline
        require_send::<data::ImportSession>();
        require_sync::<data::ImportSession>();
        require_send::<data::ParseStats>();
        require_sync::<data::ParseStats>();
        require_send::<data::ImportError>();
        require_sync::<data::ImportError>();
        require_send::<data::RowErrorSample>();
        require_sync::<data::RowErrorSample>();

        // Population & promotion
        require_send::<population::AgentPopulation>();
        require_sync::<population::AgentPopulation>();
        require_send::<population::TrainingDelta>();
        require_sync::<population::TrainingDelta>();
        require_send::<promotion::PromotionPolicy>();
        require_sync::<promotion::PromotionPolicy>();

        // Progress & RNG
        require_send::<progress::ProgressReporter>();
        require_sync::<progress::ProgressReporter>();
        require_send::<progress::ProgressSnapshot>();
        require_sync::<progress::ProgressSnapshot>();
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();
    }
}
