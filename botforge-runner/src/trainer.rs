//! Training orchestrator — fans the validated bar sequence out to the
//! agent population and aggregates the results.
//!
//! Concurrency discipline: workers compute `TrainingDelta`s in parallel
//! over a private rayon pool and return them; a single aggregator applies
//! them to the population serially through `apply_training_result`.
//! Workers never touch shared state, so cancellation between batches can
//! abandon computed-but-unapplied work without leaving partial mutations
//! behind. All aggregate counters are per-agent sums, making the final
//! report invariant to worker count and scheduling order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rayon::prelude::*;
use thiserror::Error;

use botforge_core::data::{ImportSession, ImportState};
use botforge_core::domain::{AgentId, Grade, Performance, Tier};
use botforge_core::population::{AgentPopulation, TrainingDelta};
use botforge_core::progress::{Phase, ProgressReporter, ProgressSnapshot};
use botforge_core::rng::RngHierarchy;

use crate::config::TrainingConfig;
use crate::features::DatasetFeatures;
use crate::report::{RunOutcome, RunReportBuilder, RunTotals, SkippedAgent, TrainingRun};
use crate::step::{train_agent_step, StepError};

/// At most this many agents are deployed after a completed run.
pub const VPS_DEPLOYMENT_CAP: usize = 100;

/// Skip reasons retained in the report.
const SKIP_SAMPLE_CAP: usize = 10;

/// Run-level failures. Per-agent errors never surface here; they are
/// counted as skips and the run keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrainError {
    #[error("validated bar sequence is empty")]
    EmptyDataset,
    #[error("agent population is empty")]
    EmptyPopulation,
    #[error("import session is {state:?}, expected Ready")]
    SessionNotReady { state: ImportState },
}

struct AgentOutcome {
    id: AgentId,
    result: Result<TrainingDelta, StepError>,
}

/// Run one training pass with the default per-agent step.
pub fn run_training(
    session: &ImportSession,
    population: &mut AgentPopulation,
    config: &TrainingConfig,
    progress: Option<&ProgressReporter>,
    cancel: Option<&AtomicBool>,
) -> Result<TrainingRun, TrainError> {
    run_training_with(session, population, config, progress, cancel, train_agent_step)
}

/// Run one training pass with a caller-supplied step function.
///
/// The step must be a pure function of its arguments: it is executed
/// concurrently across the worker pool and exactly once per agent.
pub fn run_training_with<F>(
    session: &ImportSession,
    population: &mut AgentPopulation,
    config: &TrainingConfig,
    progress: Option<&ProgressReporter>,
    cancel: Option<&AtomicBool>,
    step_fn: F,
) -> Result<TrainingRun, TrainError>
where
    F: Fn(&Performance, &DatasetFeatures, &mut StdRng) -> Result<Performance, StepError> + Sync,
{
    if session.state() != ImportState::Ready {
        return Err(TrainError::SessionNotReady {
            state: session.state(),
        });
    }
    let bars = &session.valid_bars;
    if bars.is_empty() {
        return Err(TrainError::EmptyDataset);
    }
    if population.is_empty() {
        return Err(TrainError::EmptyPopulation);
    }

    let started_at = Utc::now().naive_utc();
    let started = Instant::now();

    // Seed derivation is keyed by config and dataset, never wall clock,
    // so the same inputs reproduce the same per-agent randomness.
    let run_token = format!(
        "train-{}-{}",
        config.master_seed,
        session.dataset_hash.as_deref().unwrap_or("unhashed")
    );
    let features = DatasetFeatures::extract(bars);
    let hierarchy = RngHierarchy::new(config.master_seed);
    let policy = config.promotion;
    let bar_count = bars.len() as u64;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .thread_name(|i| format!("botforge-train-{i}"))
        .build()
        .expect("failed to build training thread pool");

    // Read-only snapshot of what each step consumes.
    let inputs: Vec<(AgentId, Tier, Performance)> = population
        .agents()
        .iter()
        .map(|a| (a.id.clone(), a.tier, a.performance))
        .collect();
    let total = inputs.len();

    let mut totals = RunTotals::default();
    let mut completed = 0usize;
    let mut cancelled = false;

    for batch in inputs.chunks(config.batch_size.max(1)) {
        // No new agent steps start after cancellation is observed.
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            cancelled = true;
            break;
        }

        let outcomes: Vec<AgentOutcome> = pool.install(|| {
            batch
                .par_iter()
                .map(|(id, tier, performance)| {
                    let mut rng = hierarchy.rng_for(&run_token, id);
                    let result =
                        step_fn(performance, &features, &mut rng).map(|performance| {
                            TrainingDelta {
                                tier: policy.promote(*tier, &performance),
                                performance,
                                trained_at: started_at,
                            }
                        });
                    AgentOutcome {
                        id: id.clone(),
                        result,
                    }
                })
                .collect()
        });

        for outcome in outcomes {
            completed += 1;
            match outcome.result {
                Ok(delta) => {
                    let applied = population
                        .apply_training_result(&outcome.id, delta)
                        .expect("snapshot ids belong to this population");
                    totals.bots_trained += 1;
                    totals.data_points_processed += bar_count;
                    if applied.tier_before < Tier::Elite && applied.tier_after >= Tier::Elite {
                        totals.new_elite_bots += 1;
                    }
                    if applied.tier_before < Tier::Godmode
                        && applied.tier_after >= Tier::Godmode
                    {
                        totals.new_godmode_bots += 1;
                    }
                    if applied.grade_before < Grade::APlus && applied.grade_after >= Grade::APlus
                    {
                        totals.screenshots_captured += 1;
                    }
                }
                Err(e) => {
                    totals.skipped_agents += 1;
                    if totals.skipped_samples.len() < SKIP_SAMPLE_CAP {
                        totals.skipped_samples.push(SkippedAgent {
                            id: outcome.id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(reporter) = progress {
            let elapsed = started.elapsed().as_secs_f64();
            reporter.publish(ProgressSnapshot {
                phase: Phase::Training,
                fraction_complete: completed as f64 / total as f64,
                rows_per_sec: if elapsed > 0.0 {
                    completed as f64 / elapsed
                } else {
                    0.0
                },
                quality_score_so_far: Some(session.quality_score),
            });
        }
    }

    let outcome = if cancelled {
        RunOutcome::Cancelled
    } else {
        RunOutcome::Completed
    };

    // Deployment happens only after a run that actually finished.
    let vps_deployments = match outcome {
        RunOutcome::Completed => population
            .count_at_or_above(Tier::Elite)
            .min(VPS_DEPLOYMENT_CAP) as u64,
        RunOutcome::Cancelled => 0,
    };

    Ok(
        RunReportBuilder::new(started_at, session.quality_score, session.dataset_hash.clone())
            .build(totals, outcome, vps_deployments, Utc::now().naive_utc()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use botforge_core::data::{BarParser, ParseOutcome};

    fn ready_session(rows: usize) -> ImportSession {
        let mut raw = String::from("Date,Time,Open,High,Low,Close,Volume\n");
        for i in 0..rows {
            raw.push_str(&format!(
                "2024.01.{:02},{:02}:00:00,100,101,99,100.5,1000\n",
                i / 24 + 1,
                i % 24
            ));
        }
        let ParseOutcome::Complete(data) = BarParser::default().parse(&raw, None, None).unwrap()
        else {
            panic!("unexpected cancellation");
        };
        let mut session = ImportSession::new();
        session.begin_parsing().unwrap();
        session.complete(data).unwrap();
        session
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            population_size: 10,
            worker_threads: 1,
            batch_size: 4,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn rejects_unready_session() {
        let session = ImportSession::new();
        let mut population = AgentPopulation::new(10, 1).unwrap();
        let err = run_training(&session, &mut population, &small_config(), None, None)
            .unwrap_err();
        assert_eq!(
            err,
            TrainError::SessionNotReady {
                state: ImportState::Idle
            }
        );
    }

    #[test]
    fn trains_every_agent_exactly_once() {
        let session = ready_session(48);
        let mut population = AgentPopulation::new(10, 1).unwrap();
        let run = run_training(&session, &mut population, &small_config(), None, None).unwrap();
        assert_eq!(run.outcome, RunOutcome::Completed);
        assert_eq!(run.bots_trained, 10);
        assert_eq!(run.data_points_processed, 10 * 48);
        assert!(population.agents().iter().all(|a| a.last_trained_at.is_some()));
    }

    #[test]
    fn constant_godmode_step_promotes_all() {
        // The worked example: a step that always returns 0.9/3.0 turns a
        // 10-agent population fully Godmode.
        let session = ready_session(24);
        let mut population = AgentPopulation::new(10, 1).unwrap();
        let run = run_training_with(
            &session,
            &mut population,
            &small_config(),
            None,
            None,
            |perf, _features, _rng| {
                Ok(Performance {
                    win_rate: 0.9,
                    total_trades: perf.total_trades + 1,
                    profit_factor: 3.0,
                })
            },
        )
        .unwrap();
        assert_eq!(run.new_godmode_bots, 10);
        assert_eq!(run.new_elite_bots, 10);
        assert_eq!(population.tier_counts().godmode, 10);
    }

    #[test]
    fn failing_agents_are_skipped_not_fatal() {
        let session = ready_session(24);
        let mut agents = AgentPopulation::new(10, 1).unwrap().agents().to_vec();
        // Marker state the step below treats as corrupt.
        agents[3].performance.total_trades = 999;
        let poisoned = agents[3].id.clone();
        let mut population = AgentPopulation::from_agents(agents).unwrap();

        let run = run_training_with(
            &session,
            &mut population,
            &small_config(),
            None,
            None,
            |perf, _features, _rng| {
                if perf.total_trades == 999 {
                    Err(StepError::InvalidPerformance)
                } else {
                    Ok(Performance {
                        win_rate: 0.6,
                        total_trades: perf.total_trades + 1,
                        profit_factor: 1.2,
                    })
                }
            },
        )
        .unwrap();

        assert_eq!(run.outcome, RunOutcome::Completed);
        assert_eq!(run.bots_trained, 9);
        assert_eq!(run.skipped_agents, 1);
        assert_eq!(run.skipped_samples.len(), 1);
        assert_eq!(run.skipped_samples[0].id, poisoned);
        assert_eq!(run.data_points_processed, 9 * 24);

        // The skipped agent kept its pre-run state untouched.
        let skipped = population.get(&poisoned).unwrap();
        assert!(skipped.last_trained_at.is_none());
        assert_eq!(skipped.performance.total_trades, 999);
    }

    #[test]
    fn cancellation_before_start_trains_nothing() {
        let session = ready_session(24);
        let mut population = AgentPopulation::new(50, 1).unwrap();
        let cancel = AtomicBool::new(true);
        let run = run_training(
            &session,
            &mut population,
            &small_config(),
            None,
            Some(&cancel),
        )
        .unwrap();
        assert_eq!(run.outcome, RunOutcome::Cancelled);
        assert_eq!(run.bots_trained, 0);
        assert_eq!(run.data_points_processed, 0);
        assert_eq!(run.vps_deployments, 0);
        assert!(population.agents().iter().all(|a| a.last_trained_at.is_none()));
    }
}
