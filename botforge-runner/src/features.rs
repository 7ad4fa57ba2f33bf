//! Dataset feature extraction — pure functions over the validated bar
//! sequence, computed once per run and shared by every agent's step.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use botforge_core::domain::HistoricalBar;

/// Gap threshold between adjacent bars: anything over two hours counts.
const GAP_THRESHOLD_SECS: i64 = 2 * 3600;

/// Aggregate features of one validated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFeatures {
    pub bar_count: usize,
    pub mean_close: f64,
    /// Population standard deviation of simple close-to-close returns.
    pub volatility: f64,
    /// Net close change over the dataset, relative to the mean close.
    /// Positive in uptrends, negative in downtrends.
    pub trend_strength: f64,
    /// Mean intrabar range (high - low).
    pub mean_range: f64,
    /// Adjacent-bar time gaps over two hours.
    pub gap_count: usize,
}

impl DatasetFeatures {
    /// Extract features from a non-empty bar sequence.
    ///
    /// Deterministic: same bars, same features, regardless of when or
    /// where this runs.
    pub fn extract(bars: &[HistoricalBar]) -> Self {
        let bar_count = bars.len();
        if bar_count == 0 {
            return Self::empty();
        }

        let mean_close = bars.iter().map(|b| b.close).sum::<f64>() / bar_count as f64;
        let mean_range = bars.iter().map(|b| b.range()).sum::<f64>() / bar_count as f64;

        let returns: Vec<f64> = bars
            .windows(2)
            .filter(|w| w[0].close > 0.0)
            .map(|w| (w[1].close - w[0].close) / w[0].close)
            .collect();
        let volatility = population_std_dev(&returns);

        let trend_strength = if mean_close > 0.0 {
            (bars[bar_count - 1].close - bars[0].close) / mean_close
        } else {
            0.0
        };

        let gap_threshold = Duration::seconds(GAP_THRESHOLD_SECS);
        let gap_count = bars
            .windows(2)
            .filter(|w| w[1].timestamp - w[0].timestamp > gap_threshold)
            .count();

        Self {
            bar_count,
            mean_close,
            volatility,
            trend_strength,
            mean_range,
            gap_count,
        }
    }

    fn empty() -> Self {
        Self {
            bar_count: 0,
            mean_close: 0.0,
            volatility: 0.0,
            trend_strength: 0.0,
            mean_range: 0.0,
            gap_count: 0,
        }
    }
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
