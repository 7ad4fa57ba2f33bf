//! Per-agent training step — a bounded simulation, not real model fitting.
//!
//! The step is a pure function of `(performance, dataset features, seeded
//! rng)`. It never reads other agents or shared state, which is what
//! makes it safe to run across the worker pool in any order.

use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

use botforge_core::domain::Performance;

use crate::features::DatasetFeatures;

/// Hard cap on win rate, mirroring the ceiling the simulation converges
/// toward: no agent becomes a perfect predictor.
pub const WIN_RATE_CAP: f64 = 0.98;

/// Fraction of the distance to the feature-implied ceiling closed per run.
const LEARNING_RATE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("agent performance state is not finite")]
    InvalidPerformance,
}

/// Run one agent's training pass over the dataset features.
///
/// Returns the full replacement performance. Errors only on corrupt
/// input state; the orchestrator skips such agents and keeps going.
pub fn train_agent_step(
    performance: &Performance,
    features: &DatasetFeatures,
    rng: &mut StdRng,
) -> Result<Performance, StepError> {
    if !performance.is_valid() {
        return Err(StepError::InvalidPerformance);
    }

    // Clean trends are learnable; choppy data drags the ceiling down.
    let trend_lift = (features.trend_strength.abs() * 2.0).min(0.40);
    let volatility_drag = (features.volatility * 10.0).min(0.30);
    let ceiling = (0.55 + trend_lift - volatility_drag).clamp(0.30, WIN_RATE_CAP);

    let jitter = rng.gen_range(-0.02..=0.02);
    let win_rate = (performance.win_rate + (ceiling - performance.win_rate) * LEARNING_RATE
        + jitter)
        .clamp(0.0, WIN_RATE_CAP);

    let pf_drift = 1.0 + features.trend_strength.clamp(-0.5, 0.5) * 0.4;
    let pf_jitter = rng.gen_range(-0.05..=0.05);
    let profit_factor = (performance.profit_factor * pf_drift + win_rate * 0.5 + pf_jitter)
        .clamp(0.0, 10.0);

    // Roughly one simulated trade per trading day of hourly bars.
    let trades_simulated = (features.bar_count as u64 / 24).max(1);

    Ok(Performance {
        win_rate,
        total_trades: performance.total_trades + trades_simulated,
        profit_factor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn features(trend: f64, volatility: f64, bars: usize) -> DatasetFeatures {
        DatasetFeatures {
            bar_count: bars,
            mean_close: 2000.0,
            volatility,
            trend_strength: trend,
            mean_range: 2.0,
            gap_count: 0,
        }
    }

    #[test]
    fn step_is_deterministic_per_seed() {
        let perf = Performance::default();
        let f = features(0.1, 0.01, 240);
        let a = train_agent_step(&perf, &f, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = train_agent_step(&perf, &f, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let perf = Performance::default();
        let f = features(0.1, 0.01, 240);
        let a = train_agent_step(&perf, &f, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = train_agent_step(&perf, &f, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn win_rate_stays_in_bounds() {
        let f = features(0.5, 0.0, 240);
        let mut perf = Performance::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            perf = train_agent_step(&perf, &f, &mut rng).unwrap();
            assert!((0.0..=WIN_RATE_CAP).contains(&perf.win_rate));
            assert!(perf.profit_factor >= 0.0);
        }
    }

    #[test]
    fn trades_accumulate() {
        let f = features(0.0, 0.0, 240);
        let perf = train_agent_step(
            &Performance::default(),
            &f,
            &mut StdRng::seed_from_u64(4),
        )
        .unwrap();
        assert_eq!(perf.total_trades, 10);
    }

    #[test]
    fn corrupt_state_is_rejected() {
        let bad = Performance {
            win_rate: f64::NAN,
            total_trades: 0,
            profit_factor: 1.0,
        };
        let err = train_agent_step(&bad, &features(0.0, 0.0, 24), &mut StdRng::seed_from_u64(5));
        assert_eq!(err.unwrap_err(), StepError::InvalidPerformance);
    }

    #[test]
    fn trending_data_lifts_win_rate_faster_than_flat() {
        let start = Performance::default();
        let trended = train_agent_step(&start, &features(0.3, 0.0, 240), &mut StdRng::seed_from_u64(6))
            .unwrap();
        let flat = train_agent_step(&start, &features(0.0, 0.03, 240), &mut StdRng::seed_from_u64(6))
            .unwrap();
        assert!(trended.win_rate > flat.win_rate);
    }
}
