//! Import session — single-owner record of one ingestion attempt.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::parser::{ImportError, ParseStats, ParsedData, RowErrorSample};
use crate::data::quality::quality_score;
use crate::domain::HistoricalBar;

/// Lifecycle of an import attempt.
///
/// `Idle → Parsing → Validating → Ready` on success; `Parsing → Failed`
/// on a fatal condition; `Parsing`/`Validating` may move to `Cancelled`.
/// `Ready`, `Failed`, and `Cancelled` are terminal and mutually
/// distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportState {
    Idle,
    Parsing,
    Validating,
    Ready,
    Failed,
    Cancelled,
}

impl ImportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Cancelled)
    }

    fn can_transition(self, to: Self) -> bool {
        use ImportState::*;
        matches!(
            (self, to),
            (Idle, Parsing)
                | (Parsing, Validating)
                | (Parsing, Failed)
                | (Parsing, Cancelled)
                | (Validating, Ready)
                | (Validating, Cancelled)
        )
    }
}

/// A state-machine violation. Always a caller bug, never an input error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal import state transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: ImportState,
    pub to: ImportState,
}

/// One ingestion attempt: parse accounting, validated bars, quality
/// score, and lifecycle state. Owned exclusively by the orchestrating
/// caller; discarded when the run completes or is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    state: ImportState,
    pub stats: ParseStats,
    pub valid_bars: Vec<HistoricalBar>,
    pub error_samples: Vec<RowErrorSample>,
    pub quality_score: f64,
    pub throughput_rows_per_sec: f64,
    /// Populated when `state == Failed`.
    pub failure: Option<ImportError>,
    /// Content hash of the validated bar stream, populated on `Ready`.
    pub dataset_hash: Option<String>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self {
            state: ImportState::Idle,
            stats: ParseStats::default(),
            valid_bars: Vec::new(),
            error_samples: Vec::new(),
            quality_score: 0.0,
            throughput_rows_per_sec: 0.0,
            failure: None,
            dataset_hash: None,
        }
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    fn transition(&mut self, to: ImportState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// `Idle → Parsing`.
    pub fn begin_parsing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(ImportState::Parsing)
    }

    /// Accept a completed parse pass: `Parsing → Validating → Ready`,
    /// scoring the data and hashing the validated bar stream in between.
    pub fn complete(&mut self, data: ParsedData) -> Result<(), InvalidTransition> {
        self.transition(ImportState::Validating)?;
        self.quality_score = quality_score(&data.stats);
        self.dataset_hash = Some(dataset_hash(&data.bars));
        self.stats = data.stats;
        self.valid_bars = data.bars;
        self.error_samples = data.error_samples;
        self.throughput_rows_per_sec = data.rows_per_sec;
        self.transition(ImportState::Ready)
    }

    /// Record a fatal input error: `Parsing → Failed`.
    pub fn fail(&mut self, error: ImportError) -> Result<(), InvalidTransition> {
        self.failure = Some(error);
        self.transition(ImportState::Failed)
    }

    /// Record cooperative cancellation, keeping partial accounting.
    pub fn cancel(&mut self, partial: ParsedData) -> Result<(), InvalidTransition> {
        self.stats = partial.stats;
        self.error_samples = partial.error_samples;
        self.throughput_rows_per_sec = partial.rows_per_sec;
        self.transition(ImportState::Cancelled)
    }

    pub fn raw_byte_count(&self) -> u64 {
        self.stats.raw_byte_count
    }

    pub fn total_lines_seen(&self) -> u64 {
        self.stats.total_lines_seen
    }

    pub fn invalid_row_count(&self) -> u64 {
        self.stats.invalid_row_count
    }
}

impl Default for ImportSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic content hash over the validated bar stream.
fn dataset_hash(bars: &[HistoricalBar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        hasher.update(&bar.open.to_bits().to_le_bytes());
        hasher.update(&bar.high.to_bits().to_le_bytes());
        hasher.update(&bar.low.to_bits().to_le_bytes());
        hasher.update(&bar.close.to_bits().to_le_bytes());
        hasher.update(&bar.volume.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser::{BarParser, ParseOutcome};

    fn parsed(raw: &str) -> ParsedData {
        match BarParser::default().parse(raw, None, None).unwrap() {
            ParseOutcome::Complete(data) => data,
            ParseOutcome::Cancelled(_) => panic!("unexpected cancellation"),
        }
    }

    #[test]
    fn happy_path_reaches_ready() {
        let mut session = ImportSession::new();
        session.begin_parsing().unwrap();
        session
            .complete(parsed("2024.01.01,00:00:00,100,101,99,100.5,1000"))
            .unwrap();
        assert_eq!(session.state(), ImportState::Ready);
        assert_eq!(session.quality_score, 100.0);
        assert!(session.dataset_hash.is_some());
        assert_eq!(session.valid_bars.len(), 1);
    }

    #[test]
    fn failure_is_terminal_and_distinct() {
        let mut session = ImportSession::new();
        session.begin_parsing().unwrap();
        session.fail(ImportError::Empty).unwrap();
        assert_eq!(session.state(), ImportState::Failed);
        assert!(session.state().is_terminal());
        assert_eq!(session.failure, Some(ImportError::Empty));
    }

    #[test]
    fn cancellation_is_not_failure() {
        let mut session = ImportSession::new();
        session.begin_parsing().unwrap();
        session.cancel(parsed("2024.01.01,00:00:00,100,101,99,100.5,1000")).unwrap();
        assert_eq!(session.state(), ImportState::Cancelled);
        assert!(session.failure.is_none());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut session = ImportSession::new();
        // Cannot complete without parsing first.
        let err = session
            .complete(parsed("2024.01.01,00:00:00,100,101,99,100.5,1000"))
            .unwrap_err();
        assert_eq!(err.from, ImportState::Idle);

        session.begin_parsing().unwrap();
        session.fail(ImportError::Empty).unwrap();
        // Terminal states accept nothing further.
        assert!(session.begin_parsing().is_err());
    }

    #[test]
    fn dataset_hash_is_content_addressed() {
        let a = dataset_hash(&parsed("2024.01.01,00:00:00,100,101,99,100.5,1000").bars);
        let b = dataset_hash(&parsed("2024.01.01,00:00:00,100,101,99,100.5,1000").bars);
        let c = dataset_hash(&parsed("2024.01.01,00:00:00,100,101,99,100.6,1000").bars);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn session_accessors_mirror_stats() {
        let mut session = ImportSession::new();
        session.begin_parsing().unwrap();
        session
            .complete(parsed("BAD\n2024.01.01,00:00:00,100,101,99,100.5,1000"))
            .unwrap();
        assert_eq!(session.total_lines_seen(), 2);
        assert_eq!(session.invalid_row_count(), 1);
        assert!(session.quality_score < 100.0);
    }
}
