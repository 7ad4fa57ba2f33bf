//! BotForge Runner — training orchestration over the core pipeline.
//!
//! This crate builds on `botforge-core` to provide:
//! - Serializable training configuration (TOML-loadable, content-hashed)
//! - Dataset feature extraction shared by every agent's step
//! - The bounded per-agent training simulation
//! - The parallel training orchestrator (private rayon pool, batched
//!   dispatch, cooperative cancellation, partial-failure isolation)
//! - Run report assembly
//! - The collaborator-facing service (import/training handles with
//!   progress subscriptions)

pub mod config;
pub mod features;
pub mod report;
pub mod service;
pub mod step;
pub mod trainer;

pub use config::{ConfigError, TrainingConfig};
pub use features::DatasetFeatures;
pub use report::{RunOutcome, RunTotals, SkippedAgent, TrainingRun};
pub use service::{ImportHandle, TrainingHandle, TrainingService};
pub use step::{train_agent_step, StepError};
pub use trainer::{run_training, run_training_with, TrainError, VPS_DEPLOYMENT_CAP};
