//! Rate-limited progress reporting.
//!
//! A single thread-safe sink fed by the parser and the training
//! orchestrator. Bursts are coalesced to a bounded cadence so observer
//! cost stays independent of dataset size; subscribers receive snapshots
//! over plain `mpsc` channels.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Pipeline phase a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Importing,
    Training,
}

/// One progress observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    /// Monotonically non-decreasing within a phase, in [0, 1].
    pub fraction_complete: f64,
    /// Records processed per second, recomputed at each emitted tick.
    pub rows_per_sec: f64,
    /// Quality score once known (import phase publishes it on completion).
    pub quality_score_so_far: Option<f64>,
}

/// Default coalescing interval: 50 ms, ~20 snapshots/second at most.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(50);

struct Inner {
    subscribers: Vec<Sender<ProgressSnapshot>>,
    last_emit: Option<Instant>,
    current_phase: Option<Phase>,
    max_fraction: f64,
}

/// Coalescing fan-out sink for [`ProgressSnapshot`]s.
///
/// Publishers may call [`publish`](Self::publish) as often as they like
/// (though not per-row); only phase entries, phase completions, and
/// snapshots at least `min_interval` apart are forwarded. The reported
/// fraction is clamped so it never decreases within a phase.
pub struct ProgressReporter {
    min_interval: Duration,
    inner: Mutex<Inner>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_min_interval(DEFAULT_MIN_INTERVAL)
    }

    pub fn with_min_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                last_emit: None,
                current_phase: None,
                max_fraction: 0.0,
            }),
        }
    }

    /// Register an observer. Dropped receivers are pruned on the next emit.
    pub fn subscribe(&self) -> Receiver<ProgressSnapshot> {
        let (tx, rx) = channel();
        self.inner.lock().expect("progress lock poisoned").subscribers.push(tx);
        rx
    }

    /// Offer a snapshot to the sink. Returns true if it was forwarded.
    pub fn publish(&self, mut snapshot: ProgressSnapshot) -> bool {
        let mut inner = self.inner.lock().expect("progress lock poisoned");

        let phase_changed = inner.current_phase != Some(snapshot.phase);
        if phase_changed {
            inner.current_phase = Some(snapshot.phase);
            inner.max_fraction = 0.0;
        }

        // Clamp to [0, 1] and enforce monotonicity within the phase.
        let fraction = snapshot.fraction_complete.clamp(0.0, 1.0);
        let fraction = fraction.max(inner.max_fraction);
        snapshot.fraction_complete = fraction;

        // Terminal snapshots always pass the gate so a phase's final
        // observation (e.g. the one carrying the quality score) is never
        // coalesced away.
        let completing = fraction >= 1.0;
        inner.max_fraction = fraction;

        let due = match inner.last_emit {
            None => true,
            Some(t) => t.elapsed() >= self.min_interval,
        };

        if !(phase_changed || completing || due) {
            return false;
        }

        inner.last_emit = Some(Instant::now());
        inner
            .subscribers
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
        true
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
