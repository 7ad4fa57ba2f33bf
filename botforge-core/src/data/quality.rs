//! Data-quality scoring — a pure function of parse statistics.

use crate::data::parser::ParseStats;

/// Penalty weight applied to the invalid-row ratio.
pub const INVALID_WEIGHT: f64 = 100.0;

/// Penalty weight applied to the out-of-order/duplicate ratio. Disordered
/// bars are still usable after sorting, so they cost a quarter as much as
/// rows that carried no usable data at all.
pub const DISORDER_WEIGHT: f64 = 25.0;

/// Score a parse pass in [0, 100].
///
/// `score = 100 - 100 * invalid_ratio - 25 * disorder_ratio`, floored at
/// 0, with both ratios taken over the data lines seen (header and blank
/// lines excluded). Depends only on the counters passed in, never on
/// wall-clock time or thread scheduling, so identical statistics always
/// yield the identical score.
pub fn quality_score(stats: &ParseStats) -> f64 {
    if stats.total_lines_seen == 0 {
        return 0.0;
    }
    let lines = stats.total_lines_seen as f64;
    let invalid_ratio = stats.invalid_row_count as f64 / lines;
    let disorder_ratio = (stats.out_of_order_count + stats.duplicate_count) as f64 / lines;
    (100.0 - INVALID_WEIGHT * invalid_ratio - DISORDER_WEIGHT * disorder_ratio).clamp(0.0, 100.0)
}
