//! Run report — the immutable aggregate of one training pass.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use botforge_core::domain::AgentId;

/// How a training run ended. `Cancelled` is not a failure; run-level
/// failures surface as `TrainError` before a report exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// One agent skipped by partial-failure isolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedAgent {
    pub id: AgentId,
    pub reason: String,
}

/// Counters accumulated by the orchestrator's aggregator.
///
/// Every field is a sum of per-agent contributions, so totals come out
/// the same whatever the worker count or completion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTotals {
    pub bots_trained: u64,
    pub data_points_processed: u64,
    /// Agents that newly reached Elite or above this run.
    pub new_elite_bots: u64,
    /// Agents that newly reached Godmode this run.
    pub new_godmode_bots: u64,
    pub skipped_agents: u64,
    /// First few skip reasons, for the report.
    pub skipped_samples: Vec<SkippedAgent>,
    /// Agents whose grade first reached A+ this run.
    pub screenshots_captured: u64,
}

/// The final, immutable record of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub outcome: RunOutcome,
    pub bots_trained: u64,
    pub data_points_processed: u64,
    pub new_elite_bots: u64,
    pub new_godmode_bots: u64,
    pub skipped_agents: u64,
    pub skipped_samples: Vec<SkippedAgent>,
    pub screenshots_captured: u64,
    /// Top performers deployed after a completed run (at most 100).
    pub vps_deployments: u64,
    /// Quality score of the dataset the run trained on.
    pub quality_score: f64,
    pub dataset_hash: Option<String>,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
    /// Human-readable digest, derived from the counts above and nothing
    /// else.
    pub summary: String,
}

/// Assembles a [`TrainingRun`] once the orchestrator finishes.
#[derive(Debug)]
pub struct RunReportBuilder {
    started_at: NaiveDateTime,
    quality_score: f64,
    dataset_hash: Option<String>,
}

impl RunReportBuilder {
    pub fn new(
        started_at: NaiveDateTime,
        quality_score: f64,
        dataset_hash: Option<String>,
    ) -> Self {
        Self {
            started_at,
            quality_score,
            dataset_hash,
        }
    }

    pub fn build(
        self,
        totals: RunTotals,
        outcome: RunOutcome,
        vps_deployments: u64,
        completed_at: NaiveDateTime,
    ) -> TrainingRun {
        let summary = render_summary(&totals, outcome, vps_deployments, self.quality_score);
        TrainingRun {
            outcome,
            bots_trained: totals.bots_trained,
            data_points_processed: totals.data_points_processed,
            new_elite_bots: totals.new_elite_bots,
            new_godmode_bots: totals.new_godmode_bots,
            skipped_agents: totals.skipped_agents,
            skipped_samples: totals.skipped_samples,
            screenshots_captured: totals.screenshots_captured,
            vps_deployments,
            quality_score: self.quality_score,
            dataset_hash: self.dataset_hash,
            started_at: self.started_at,
            completed_at,
            summary,
        }
    }
}

/// Pure function of the final counts: identical counts always render the
/// identical summary.
fn render_summary(
    totals: &RunTotals,
    outcome: RunOutcome,
    vps_deployments: u64,
    quality_score: f64,
) -> String {
    let headline = match outcome {
        RunOutcome::Completed => "Training complete",
        RunOutcome::Cancelled => "Training cancelled",
    };
    format!(
        "{headline}: {} bots trained\n\
         Data points processed: {}\n\
         Data quality score: {:.1}\n\
         New Elite bots: {}\n\
         New Godmode bots: {}\n\
         Skipped agents: {}\n\
         Screenshots captured: {}\n\
         VPS deployments: {}",
        totals.bots_trained,
        totals.data_points_processed,
        quality_score,
        totals.new_elite_bots,
        totals.new_godmode_bots,
        totals.skipped_agents,
        totals.screenshots_captured,
        vps_deployments,
    )
}
