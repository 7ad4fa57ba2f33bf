//! Collaborator-facing surface — import/training handles over worker
//! threads.
//!
//! Presentation code hands this service raw file text and gets back a
//! handle per operation: a progress subscription on the shared reporter,
//! cooperative `cancel()`, and `wait()` for the terminal outcome. All
//! heavy work runs on named background threads; the service owns the
//! agent population for the application's lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use botforge_core::data::{BarParser, ImportSession, ParseOutcome};
use botforge_core::population::{AgentPopulation, TierCounts};
use botforge_core::progress::{ProgressReporter, ProgressSnapshot};

use crate::config::TrainingConfig;
use crate::report::TrainingRun;
use crate::trainer::{run_training, TrainError};

/// Handle to an in-flight import. Dropping it without `wait()` detaches
/// the worker; the session is then lost.
pub struct ImportHandle {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<ImportSession>,
}

impl ImportHandle {
    /// Request cooperative cancellation. The worker observes the flag at
    /// its next checkpoint; the session ends `Cancelled`, not `Failed`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the import reaches a terminal state
    /// (`Ready | Failed | Cancelled`) and take ownership of the session.
    pub fn wait(self) -> ImportSession {
        self.thread.join().expect("import worker panicked")
    }
}

/// Handle to an in-flight training run.
pub struct TrainingHandle {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<Result<TrainingRun, TrainError>>,
}

impl TrainingHandle {
    /// Request cooperative cancellation. No new agent steps start after
    /// the flag is observed; the run ends `Cancelled`.
    ///
    /// A caller-supplied deadline is this same flag flipped by a timer;
    /// no operation carries an implicit timeout.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the run finishes. `Err` carries the run-level
    /// failures (`EmptyDataset`, `EmptyPopulation`, `SessionNotReady`);
    /// cancellation is a successful `TrainingRun` with a `Cancelled`
    /// outcome.
    pub fn wait(self) -> Result<TrainingRun, TrainError> {
        self.thread.join().expect("training worker panicked")
    }
}

/// The pipeline entry point owned by the embedding application.
///
/// Constructor-injected, no globals: the service owns the population and
/// the shared progress reporter, and hands out handles for imports and
/// training runs.
pub struct TrainingService {
    config: TrainingConfig,
    population: Arc<Mutex<AgentPopulation>>,
    reporter: Arc<ProgressReporter>,
}

impl TrainingService {
    /// Build the service and initialize the agent population once.
    pub fn new(config: TrainingConfig) -> Result<Self, TrainError> {
        let population = AgentPopulation::new(config.population_size, config.population_seed)
            .map_err(|_| TrainError::EmptyPopulation)?;
        let reporter = Arc::new(ProgressReporter::with_min_interval(Duration::from_millis(
            config.progress_min_interval_ms,
        )));
        Ok(Self {
            config,
            population: Arc::new(Mutex::new(population)),
            reporter,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Subscribe to progress snapshots from both pipeline phases.
    pub fn subscribe(&self) -> Receiver<ProgressSnapshot> {
        self.reporter.subscribe()
    }

    /// Tier census of the population. Blocks only between training runs;
    /// during a run the population is held by the aggregator.
    pub fn tier_counts(&self) -> TierCounts {
        self.population
            .lock()
            .expect("population lock poisoned")
            .tier_counts()
    }

    /// Read access to the population for reporting.
    pub fn with_population<R>(&self, f: impl FnOnce(&AgentPopulation) -> R) -> R {
        let population = self.population.lock().expect("population lock poisoned");
        f(&population)
    }

    /// Start ingesting raw CSV text on a background thread.
    pub fn begin_import(&self, raw_content: String) -> ImportHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);
        let reporter = Arc::clone(&self.reporter);
        let parser_config = self.config.parser.clone();

        let thread = thread::Builder::new()
            .name("botforge-import".into())
            .spawn(move || {
                let mut session = ImportSession::new();
                session.begin_parsing().expect("fresh session accepts Parsing");

                let parser = BarParser::new(parser_config);
                match parser.parse(&raw_content, Some(&reporter), Some(&cancel_flag)) {
                    Ok(ParseOutcome::Complete(data)) => {
                        session.complete(data).expect("parsing session accepts Ready");
                    }
                    Ok(ParseOutcome::Cancelled(partial)) => {
                        session
                            .cancel(partial)
                            .expect("parsing session accepts Cancelled");
                    }
                    Err(error) => {
                        session.fail(error).expect("parsing session accepts Failed");
                    }
                }
                session
            })
            .expect("failed to spawn import worker");

        ImportHandle { cancel, thread }
    }

    /// Start a training run over a `Ready` session on a background
    /// thread. The session is only read; the caller keeps it for
    /// retries.
    pub fn begin_training(&self, session: &ImportSession) -> TrainingHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);
        let reporter = Arc::clone(&self.reporter);
        let population = Arc::clone(&self.population);
        let config = self.config.clone();
        let session = session.clone();

        let thread = thread::Builder::new()
            .name("botforge-train".into())
            .spawn(move || {
                let mut population = population.lock().expect("population lock poisoned");
                run_training(
                    &session,
                    &mut population,
                    &config,
                    Some(&reporter),
                    Some(&cancel_flag),
                )
            })
            .expect("failed to spawn training worker");

        TrainingHandle { cancel, thread }
    }
}
