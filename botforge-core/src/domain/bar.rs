//! HistoricalBar — the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One OHLCV price record for a time interval.
///
/// Bars are immutable once parsed. Out-of-order or duplicate timestamps
/// are tolerated by the pipeline (counted by the parser, never rejected),
/// so consumers must not assume strict monotonicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl HistoricalBar {
    /// OHLCV sanity check: positive prices, non-negative volume, and
    /// `low <= min(open, close) <= max(open, close) <= high`.
    pub fn is_sane(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite();
        finite
            && self.open > 0.0
            && self.high > 0.0
            && self.low > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
            && self.high >= self.low
            && self.open >= self.low
            && self.open <= self.high
            && self.close >= self.low
            && self.close <= self.high
    }

    /// Intrabar range (high - low).
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
