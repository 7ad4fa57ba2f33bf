//! Agent — one simulated trading-strategy entity with mutable performance state.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, unique agent identifier.
///
/// Derived deterministically at population-initialization time (blake3 of
/// population seed and index); generation order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification level of an agent. Ordering matters: promotions move up
/// the ladder and never down within a single run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Tier {
    Standard,
    Elite,
    Godmode,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Standard => "Standard",
            Tier::Elite => "Elite",
            Tier::Godmode => "Godmode",
        };
        write!(f, "{name}")
    }
}

/// Letter grade derived from performance, A+ down to F.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Grade {
    F,
    D,
    C,
    B,
    A,
    APlus,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{s}")
    }
}

/// Mutable performance state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Fraction of winning trades, in [0, 1].
    pub win_rate: f64,
    /// Lifetime simulated trade count.
    pub total_trades: u64,
    /// Gross profit / gross loss, >= 0.
    pub profit_factor: f64,
}

impl Performance {
    /// Blended performance score in [0, 1]: half win rate, half
    /// profit factor scaled against a 3.0 ceiling.
    pub fn score(&self) -> f64 {
        let pf_component = (self.profit_factor / 3.0).min(1.0);
        (self.win_rate * 0.5 + pf_component * 0.5).clamp(0.0, 1.0)
    }

    /// Letter grade from the blended score.
    pub fn grade(&self) -> Grade {
        let score = self.score();
        if score >= 0.9 {
            Grade::APlus
        } else if score >= 0.8 {
            Grade::A
        } else if score >= 0.7 {
            Grade::B
        } else if score >= 0.6 {
            Grade::C
        } else if score >= 0.5 {
            Grade::D
        } else {
            Grade::F
        }
    }

    /// All fields finite and within their documented domains.
    pub fn is_valid(&self) -> bool {
        self.win_rate.is_finite()
            && (0.0..=1.0).contains(&self.win_rate)
            && self.profit_factor.is_finite()
            && self.profit_factor >= 0.0
    }
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            win_rate: 0.5,
            total_trades: 0,
            profit_factor: 1.0,
        }
    }
}

/// One trading-strategy agent.
///
/// `id` and `name` are fixed at creation; a training run mutates only
/// `performance`, `tier`, and `last_trained_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub tier: Tier,
    pub performance: Performance,
    pub last_trained_at: Option<NaiveDateTime>,
}
