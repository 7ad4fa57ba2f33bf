//! Domain types for the ingestion and training pipeline.

pub mod agent;
pub mod bar;

pub use agent::{Agent, AgentId, Grade, Performance, Tier};
pub use bar::HistoricalBar;
