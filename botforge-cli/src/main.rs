//! BotForge CLI — import and train commands.
//!
//! Commands:
//! - `import` — parse and score a historical bar file, print the import report
//! - `train` — import a file, run the agent army over it, print the run report

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use botforge_core::data::{ImportSession, ImportState};
use botforge_core::progress::{Phase, ProgressSnapshot};
use botforge_runner::{TrainingConfig, TrainingRun, TrainingService};

#[derive(Parser)]
#[command(
    name = "botforge",
    about = "BotForge CLI — historical data import and agent army training"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and score a historical bar CSV file.
    Import {
        /// Path to the CSV file (Date,Time,Open,High,Low,Close,Volume).
        file: PathBuf,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Import a file and run a training pass over the agent population.
    Train {
        /// Path to the CSV file.
        file: PathBuf,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Agent population size. Overrides the config file.
        #[arg(long)]
        population: Option<usize>,

        /// Worker threads (0 = available parallelism). Overrides the config file.
        #[arg(long)]
        workers: Option<usize>,

        /// Master seed for the training simulation. Overrides the config file.
        #[arg(long)]
        seed: Option<u64>,

        /// Write the full run report as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { file, config } => run_import(file, config),
        Commands::Train {
            file,
            config,
            population,
            workers,
            seed,
            output,
        } => run_train(file, config, population, workers, seed, output),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<TrainingConfig> {
    match path {
        Some(p) => TrainingConfig::from_file(&p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(TrainingConfig::default()),
    }
}

fn run_import(file: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;

    let service = TrainingService::new(TrainingConfig {
        // Import alone does not need the full army.
        population_size: 1,
        ..config
    })?;
    let progress = service.subscribe();

    let handle = service.begin_import(raw);
    drain_progress(&progress, || handle.is_finished());
    let session = handle.wait();

    print_import_report(&session);

    if session.state() == ImportState::Failed {
        std::process::exit(1);
    }
    Ok(())
}

fn run_train(
    file: PathBuf,
    config: Option<PathBuf>,
    population: Option<usize>,
    workers: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(n) = population {
        config.population_size = n;
    }
    if let Some(n) = workers {
        config.worker_threads = n;
    }
    if let Some(n) = seed {
        config.master_seed = n;
    }

    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;

    let service = TrainingService::new(config)?;
    let progress = service.subscribe();

    let import = service.begin_import(raw);
    drain_progress(&progress, || import.is_finished());
    let session = import.wait();
    print_import_report(&session);

    match session.state() {
        ImportState::Ready => {}
        ImportState::Failed => bail!(
            "import failed: {}",
            session
                .failure
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".into())
        ),
        state => bail!("import ended in state {state:?}"),
    }

    let training = service.begin_training(&session);
    drain_progress(&progress, || training.is_finished());
    let run = training.wait()?;

    print_run_report(&run);

    let counts = service.tier_counts();
    println!(
        "Army tiers:     {} Standard / {} Elite / {} Godmode",
        counts.standard, counts.elite, counts.godmode
    );
    service.with_population(|population| {
        println!("--- Top performers ---");
        for agent in population.top_performers(5) {
            println!(
                "  {:<24} {:<8} win {:>5.1}%  pf {:>4.2}  grade {}",
                agent.name,
                agent.tier.to_string(),
                agent.performance.win_rate * 100.0,
                agent.performance.profit_factor,
                agent.performance.grade(),
            );
        }
    });
    println!();

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&run)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

/// Print progress snapshots until the operation finishes.
fn drain_progress(rx: &Receiver<ProgressSnapshot>, finished: impl Fn() -> bool) {
    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(RecvTimeoutError::Timeout) => {
                if finished() {
                    // Flush anything emitted between the timeout and now.
                    for snapshot in rx.try_iter() {
                        print_snapshot(&snapshot);
                    }
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn print_snapshot(snapshot: &ProgressSnapshot) {
    let phase = match snapshot.phase {
        Phase::Importing => "import",
        Phase::Training => "train",
    };
    println!(
        "[{phase}] {:5.1}%  {:>10.0} rec/s",
        snapshot.fraction_complete * 100.0,
        snapshot.rows_per_sec,
    );
}

fn print_import_report(session: &ImportSession) {
    println!();
    println!("=== Import Report ===");
    println!("State:          {:?}", session.state());
    println!("Bytes read:     {}", session.raw_byte_count());
    println!("Lines seen:     {}", session.total_lines_seen());
    println!("Valid bars:     {}", session.valid_bars.len());
    println!("Invalid rows:   {}", session.invalid_row_count());
    println!("Out of order:   {}", session.stats.out_of_order_count);
    println!("Duplicates:     {}", session.stats.duplicate_count);
    println!("Quality score:  {:.1}", session.quality_score);
    println!("Throughput:     {:.0} rows/s", session.throughput_rows_per_sec);
    if let Some(hash) = &session.dataset_hash {
        println!("Dataset hash:   {}", &hash[..16.min(hash.len())]);
    }
    if let Some(failure) = &session.failure {
        println!("Failure:        {failure}");
    }
    if !session.error_samples.is_empty() {
        println!("--- First {} row errors ---", session.error_samples.len());
        for sample in &session.error_samples {
            println!("  line {}: {}", sample.line, sample.error);
        }
    }
    println!();
}

fn print_run_report(run: &TrainingRun) {
    println!("=== Training Run ===");
    println!("{}", run.summary);
    if !run.skipped_samples.is_empty() {
        println!("--- Skip reasons ---");
        for skip in &run.skipped_samples {
            println!("  {}: {}", skip.id, skip.reason);
        }
    }
    println!(
        "Elapsed:        {:.2}s",
        (run.completed_at - run.started_at).num_milliseconds() as f64 / 1000.0
    );
    println!();
}
