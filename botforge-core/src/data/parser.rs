//! Tolerant streaming CSV bar parser.
//!
//! Accepts `Date,Time,Open,High,Low,Close,Volume` rows (header optional),
//! date `YYYY.MM.DD`, time `HH:MM:SS`. Malformed rows are counted and
//! sampled, never fatal; the import only fails on empty input, an input
//! over the size limit, or zero valid rows. Parsing is a single pass,
//! so large files cost linear time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::HistoricalBar;
use crate::progress::{Phase, ProgressReporter, ProgressSnapshot};

/// Default input cap: 100 MB.
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Default number of row errors retained for diagnostics.
pub const DEFAULT_ERROR_SAMPLE_CAP: usize = 10;

/// Rows between cancellation checks and progress offers. The reporter
/// does its own time-based coalescing on top of this.
const CHECKPOINT_ROWS: u64 = 512;

const EXPECTED_FIELDS: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub max_size_bytes: u64,
    pub error_sample_cap: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            error_sample_cap: DEFAULT_ERROR_SAMPLE_CAP,
        }
    }
}

/// Fatal import failure. Everything else is recovered per row.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ImportError {
    #[error("input is empty")]
    Empty,
    #[error("input is {actual} bytes, over the {limit} byte limit")]
    TooLarge { actual: u64, limit: u64 },
    #[error("no valid rows ({invalid_rows} rows rejected)")]
    NoValidRows { invalid_rows: u64 },
}

/// Why a single row was rejected.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RowError {
    #[error("expected {EXPECTED_FIELDS} fields, found {found}")]
    FieldCount { found: usize },
    #[error("bad date '{0}' (expected YYYY.MM.DD)")]
    BadDate(String),
    #[error("bad time '{0}' (expected HH:MM:SS)")]
    BadTime(String),
    #[error("non-numeric {field} '{value}'")]
    BadNumber { field: String, value: String },
    #[error("OHLC invariant violated")]
    Invariant,
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// One sampled row rejection, for the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowErrorSample {
    /// 1-based line number in the raw input.
    pub line: u64,
    pub error: RowError,
}

/// Accounting over one parse pass.
///
/// Invariant: `valid_row_count + invalid_row_count == total_lines_seen`
/// (data rows only; a detected header and blank lines are not "seen").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseStats {
    pub raw_byte_count: u64,
    pub total_lines_seen: u64,
    pub valid_row_count: u64,
    pub invalid_row_count: u64,
    pub out_of_order_count: u64,
    pub duplicate_count: u64,
    pub header_detected: bool,
}

/// Validated bars plus accounting from one pass.
#[derive(Debug, Clone)]
pub struct ParsedData {
    pub bars: Vec<HistoricalBar>,
    pub stats: ParseStats,
    pub error_samples: Vec<RowErrorSample>,
    pub rows_per_sec: f64,
}

/// Outcome of a parse pass that did not hit a fatal condition.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// Full pass over the input.
    Complete(ParsedData),
    /// Cancellation observed mid-parse; partial accounting retained.
    Cancelled(ParsedData),
}

/// Streaming parser for historical bar files.
pub struct BarParser {
    config: ParserConfig,
}

impl BarParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse raw CSV text into validated bars.
    ///
    /// Progress is offered to `progress` at a bounded cadence (never per
    /// row); `cancel` is observed at the same checkpoints.
    pub fn parse(
        &self,
        raw: &str,
        progress: Option<&ProgressReporter>,
        cancel: Option<&AtomicBool>,
    ) -> Result<ParseOutcome, ImportError> {
        let raw_byte_count = raw.len() as u64;
        if raw.trim().is_empty() {
            return Err(ImportError::Empty);
        }
        if raw_byte_count > self.config.max_size_bytes {
            return Err(ImportError::TooLarge {
                actual: raw_byte_count,
                limit: self.config.max_size_bytes,
            });
        }

        let started = Instant::now();
        let mut stats = ParseStats {
            raw_byte_count,
            ..ParseStats::default()
        };
        let mut bars: Vec<HistoricalBar> = Vec::new();
        let mut samples: Vec<RowErrorSample> = Vec::new();
        let mut last_timestamp = None;
        let mut first_record = true;

        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(raw.as_bytes());

        let mut records = reader.into_records();
        loop {
            let line = records.reader().position().line();
            let Some(record) = records.next() else { break };

            if first_record {
                first_record = false;
                if let Ok(ref rec) = record {
                    if is_header(rec) {
                        stats.header_detected = true;
                        continue;
                    }
                }
            }

            stats.total_lines_seen += 1;

            let row = match record {
                Ok(rec) => parse_row(&rec),
                Err(e) => Err(RowError::Malformed(e.to_string())),
            };

            match row {
                Ok(bar) => {
                    match last_timestamp {
                        Some(last) if bar.timestamp < last => stats.out_of_order_count += 1,
                        Some(last) if bar.timestamp == last => stats.duplicate_count += 1,
                        _ => {}
                    }
                    last_timestamp = Some(bar.timestamp);
                    stats.valid_row_count += 1;
                    bars.push(bar);
                }
                Err(error) => {
                    stats.invalid_row_count += 1;
                    if samples.len() < self.config.error_sample_cap {
                        samples.push(RowErrorSample { line, error });
                    }
                }
            }

            if stats.total_lines_seen % CHECKPOINT_ROWS == 0 {
                if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                    let throughput = rows_per_sec(stats.total_lines_seen, started);
                    return Ok(ParseOutcome::Cancelled(ParsedData {
                        bars,
                        stats,
                        error_samples: samples,
                        rows_per_sec: throughput,
                    }));
                }
                if let Some(reporter) = progress {
                    let consumed = records.reader().position().byte();
                    reporter.publish(ProgressSnapshot {
                        phase: Phase::Importing,
                        fraction_complete: consumed as f64 / raw_byte_count as f64,
                        rows_per_sec: rows_per_sec(stats.total_lines_seen, started),
                        quality_score_so_far: None,
                    });
                }
            }
        }

        if bars.is_empty() {
            return Err(ImportError::NoValidRows {
                invalid_rows: stats.invalid_row_count,
            });
        }

        let throughput = rows_per_sec(stats.total_lines_seen, started);
        if let Some(reporter) = progress {
            reporter.publish(ProgressSnapshot {
                phase: Phase::Importing,
                fraction_complete: 1.0,
                rows_per_sec: throughput,
                quality_score_so_far: None,
            });
        }

        Ok(ParseOutcome::Complete(ParsedData {
            bars,
            stats,
            error_samples: samples,
            rows_per_sec: throughput,
        }))
    }
}

impl Default for BarParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

fn rows_per_sec(rows: u64, started: Instant) -> f64 {
    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        rows as f64 / elapsed
    } else {
        0.0
    }
}

fn is_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|f| f.trim().eq_ignore_ascii_case("date"))
}

fn parse_row(record: &csv::StringRecord) -> Result<HistoricalBar, RowError> {
    if record.len() != EXPECTED_FIELDS {
        return Err(RowError::FieldCount {
            found: record.len(),
        });
    }

    let date_str = record[0].trim();
    let date = NaiveDate::parse_from_str(date_str, "%Y.%m.%d")
        .map_err(|_| RowError::BadDate(date_str.to_string()))?;

    let time_str = record[1].trim();
    let time = NaiveTime::parse_from_str(time_str, "%H:%M:%S")
        .map_err(|_| RowError::BadTime(time_str.to_string()))?;

    let open = parse_number("open", &record[2])?;
    let high = parse_number("high", &record[3])?;
    let low = parse_number("low", &record[4])?;
    let close = parse_number("close", &record[5])?;
    let volume = parse_number("volume", &record[6])?;

    let bar = HistoricalBar {
        timestamp: date.and_time(time),
        open,
        high,
        low,
        close,
        volume,
    };

    if !bar.is_sane() {
        return Err(RowError::Invariant);
    }
    Ok(bar)
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, RowError> {
    value.trim().parse::<f64>().map_err(|_| RowError::BadNumber {
        field: field.to_string(),
        value: value.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Date,Time,Open,High,Low,Close,Volume";

    fn parse_complete(raw: &str) -> ParsedData {
        match BarParser::default().parse(raw, None, None).unwrap() {
            ParseOutcome::Complete(data) => data,
            ParseOutcome::Cancelled(_) => panic!("unexpected cancellation"),
        }
    }

    #[test]
    fn parses_valid_rows_with_header() {
        let raw = format!(
            "{HEADER}\n2024.07.19,00:00:00,2000.12,2001.45,1999.78,2000.98,1500\n\
             2024.07.19,01:00:00,2000.98,2002.10,2000.50,2001.75,1320"
        );
        let data = parse_complete(&raw);
        assert!(data.stats.header_detected);
        assert_eq!(data.bars.len(), 2);
        assert_eq!(data.stats.total_lines_seen, 2);
        assert_eq!(data.stats.invalid_row_count, 0);
        assert_eq!(data.bars[0].open, 2000.12);
        assert_eq!(data.bars[1].volume, 1320.0);
    }

    #[test]
    fn header_is_optional() {
        let raw = "2024.07.19,00:00:00,2000.12,2001.45,1999.78,2000.98,1500";
        let data = parse_complete(raw);
        assert!(!data.stats.header_detected);
        assert_eq!(data.bars.len(), 1);
        assert_eq!(data.stats.total_lines_seen, 1);
    }

    #[test]
    fn malformed_rows_are_counted_not_fatal() {
        // The worked example: 2 valid bars, 1 invalid row.
        let raw = format!(
            "{HEADER}\n2024.01.01,00:00:00,100,101,99,100.5,1000\nBADROW\n\
             2024.01.01,01:00:00,100.5,102,100,101.8,1200"
        );
        let data = parse_complete(&raw);
        assert_eq!(data.bars.len(), 2);
        assert_eq!(data.stats.invalid_row_count, 1);
        assert_eq!(data.stats.total_lines_seen, 3);
        assert_eq!(data.error_samples.len(), 1);
        assert!(matches!(
            data.error_samples[0].error,
            RowError::FieldCount { found: 1 }
        ));
    }

    #[test]
    fn ledger_invariant_holds() {
        let raw = format!(
            "{HEADER}\nnot,a,bar,at,all,x,y\n2024.01.01,00:00:00,100,101,99,100.5,1000\n\
             2024.01.01,badtime,100,101,99,100.5,1000"
        );
        let data = parse_complete(&raw);
        assert_eq!(
            data.stats.valid_row_count + data.stats.invalid_row_count,
            data.stats.total_lines_seen
        );
    }

    #[test]
    fn rejects_invariant_violations() {
        // High below low.
        let raw = format!(
            "{HEADER}\n2024.01.01,00:00:00,100,99,101,100.5,1000\n\
             2024.01.01,01:00:00,100,101,99,100.5,1000"
        );
        let data = parse_complete(&raw);
        assert_eq!(data.bars.len(), 1);
        assert_eq!(data.error_samples[0].error, RowError::Invariant);
    }

    #[test]
    fn counts_out_of_order_and_duplicates_without_rejecting() {
        let raw = "2024.01.02,00:00:00,100,101,99,100.5,1000\n\
                   2024.01.01,00:00:00,100,101,99,100.5,1000\n\
                   2024.01.01,00:00:00,100,101,99,100.5,1000";
        let data = parse_complete(raw);
        assert_eq!(data.bars.len(), 3);
        assert_eq!(data.stats.out_of_order_count, 1);
        assert_eq!(data.stats.duplicate_count, 1);
    }

    #[test]
    fn non_numeric_price_is_sampled() {
        let raw = "2024.01.01,00:00:00,abc,101,99,100.5,1000\n\
                   2024.01.01,01:00:00,100,101,99,100.5,1000";
        let data = parse_complete(raw);
        assert_eq!(data.stats.invalid_row_count, 1);
        match &data.error_samples[0].error {
            RowError::BadNumber { field, value } => {
                assert_eq!(field, "open");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn error_samples_are_capped() {
        let parser = BarParser::new(ParserConfig {
            error_sample_cap: 3,
            ..ParserConfig::default()
        });
        let mut raw = String::new();
        for _ in 0..10 {
            raw.push_str("BADROW\n");
        }
        raw.push_str("2024.01.01,00:00:00,100,101,99,100.5,1000\n");
        let ParseOutcome::Complete(data) = parser.parse(&raw, None, None).unwrap() else {
            panic!("unexpected cancellation");
        };
        assert_eq!(data.stats.invalid_row_count, 10);
        assert_eq!(data.error_samples.len(), 3);
    }

    #[test]
    fn empty_input_is_fatal() {
        let err = BarParser::default().parse("", None, None).unwrap_err();
        assert_eq!(err, ImportError::Empty);
        let err = BarParser::default().parse("  \n \n", None, None).unwrap_err();
        assert_eq!(err, ImportError::Empty);
    }

    #[test]
    fn oversized_input_is_fatal() {
        let parser = BarParser::new(ParserConfig {
            max_size_bytes: 16,
            ..ParserConfig::default()
        });
        let err = parser
            .parse("2024.01.01,00:00:00,100,101,99,100.5,1000", None, None)
            .unwrap_err();
        assert!(matches!(err, ImportError::TooLarge { limit: 16, .. }));
    }

    #[test]
    fn zero_valid_rows_is_fatal() {
        let err = BarParser::default()
            .parse("BADROW\nANOTHER", None, None)
            .unwrap_err();
        assert_eq!(err, ImportError::NoValidRows { invalid_rows: 2 });
    }

    #[test]
    fn cancellation_observed_at_checkpoints() {
        let flag = AtomicBool::new(true);
        let mut raw = String::new();
        for i in 0..2000 {
            raw.push_str(&format!("2024.01.01,00:{:02}:00,100,101,99,100.5,1000\n", i % 60));
        }
        let outcome = BarParser::default()
            .parse(&raw, None, Some(&flag))
            .unwrap();
        match outcome {
            ParseOutcome::Cancelled(data) => {
                assert!(data.stats.total_lines_seen < 2000);
            }
            ParseOutcome::Complete(_) => panic!("cancellation not observed"),
        }
    }

    #[test]
    fn large_input_single_pass() {
        let mut raw = String::from("Date,Time,Open,High,Low,Close,Volume\n");
        for day in 1..=28 {
            for hour in 0..24 {
                raw.push_str(&format!(
                    "2024.01.{day:02},{hour:02}:00:00,100,101,99,100.5,1000\n"
                ));
            }
        }
        let data = parse_complete(&raw);
        assert_eq!(data.bars.len(), 28 * 24);
        assert_eq!(data.stats.invalid_row_count, 0);
    }
}
