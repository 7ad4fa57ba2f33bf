//! Tier promotion engine — pure gates from performance to tier.
//!
//! Evaluated once per agent after its training step. Transitions are
//! monotonic within a run: the result is never below the agent's current
//! tier, so an agent already at `Godmode` stays there even if its
//! recomputed performance would imply less. Demotion is an explicit
//! operation outside this engine.

use serde::{Deserialize, Serialize};

use crate::domain::{Performance, Tier};

/// Promotion thresholds.
///
/// Defaults: `win_rate >= 0.85` and `profit_factor >= 2.5` reach
/// `Godmode`; `win_rate >= 0.75` and `profit_factor >= 1.8` reach
/// `Elite`. These are policy, not physics: tune per run via
/// `TrainingConfig`, but both gates must stay AND-ed and Godmode must
/// dominate Elite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionPolicy {
    pub godmode_win_rate: f64,
    pub godmode_profit_factor: f64,
    pub elite_win_rate: f64,
    pub elite_profit_factor: f64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            godmode_win_rate: 0.85,
            godmode_profit_factor: 2.5,
            elite_win_rate: 0.75,
            elite_profit_factor: 1.8,
        }
    }
}

impl PromotionPolicy {
    /// Tier implied by performance alone, ignoring the current tier.
    fn implied_tier(&self, performance: &Performance) -> Tier {
        if performance.win_rate >= self.godmode_win_rate
            && performance.profit_factor >= self.godmode_profit_factor
        {
            Tier::Godmode
        } else if performance.win_rate >= self.elite_win_rate
            && performance.profit_factor >= self.elite_profit_factor
        {
            Tier::Elite
        } else {
            Tier::Standard
        }
    }

    /// Decide the post-training tier. Monotonic: never below `old_tier`.
    pub fn promote(&self, old_tier: Tier, performance: &Performance) -> Tier {
        old_tier.max(self.implied_tier(performance))
    }
}
