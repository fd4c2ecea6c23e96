//! lgp — command-line wiring for `lgp-core`'s `Trainer`.
//!
//! Loads a configuration file and a dataset, builds the built-in operation
//! set, runs the configured evolution driver `runs` times, and prints the
//! best program from each run plus summary statistics.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;

use lgp_core::builtins::standard_set;
use lgp_core::config::Configuration;
use lgp_core::dataset::load_csv;
use lgp_core::event::{CancelToken, LoggingSink};
use lgp_core::trainer::{DistributedTrainer, RunContext, SequentialTrainer};

#[derive(ClapParser)]
#[command(name = "lgp")]
#[command(about = "lgp — Linear Genetic Programming trainer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Train against a dataset using the configured evolution driver.
    Run {
        /// Path to a .yaml/.yml/.json configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to a CSV dataset; overrides the configuration's `dataset_path`.
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Run every repetition on a worker pool instead of sequentially.
        #[arg(long)]
        distributed: bool,
        /// Worker count for --distributed (defaults to available parallelism).
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            distributed,
            workers,
        } => run_training(&config, data.as_deref(), distributed, workers),
    }
}

fn run_training(
    config_path: &std::path::Path,
    data_override: Option<&std::path::Path>,
    distributed: bool,
    workers: Option<usize>,
) -> Result<(), String> {
    let config = Configuration::load_file(config_path)
        .map_err(|e| format!("failed to load {}: {e}", config_path.display()))?;

    let data_path = data_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.dataset_path));
    log::info!("loading dataset from {}", data_path.display());
    let dataset = load_csv(&data_path, config.target_columns, config.registers.n_input)
        .map_err(|e| format!("failed to load {}: {e}", data_path.display()))?;

    let operations = standard_set::<f64>();
    let ctx = RunContext::from_config(&config, &operations, dataset)
        .map_err(|e| format!("failed to build run context: {e}"))?;

    let sink = LoggingSink;
    let cancel = CancelToken::new();

    log::info!(
        "starting {} run(s) of {:?} for {} generation(s)",
        config.runs,
        config.driver,
        config.generations
    );

    let result = if distributed {
        let worker_count = workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        });
        DistributedTrainer::train(config.runs, &ctx, &sink, &cancel, worker_count)
    } else {
        SequentialTrainer::train(config.runs, &ctx, &sink, &cancel)
    }
    .map_err(|e| format!("training failed: {e}"))?;

    for (i, evaluation) in result.evaluations.iter().enumerate() {
        println!("=== run {i} ===");
        println!("{}", evaluation.best.render());
        println!("best fitness: {}", evaluation.best.fitness);
        if let Some(last) = evaluation.statistics.last() {
            println!(
                "generations: {} | population mean fitness: {:.6} | mean length: {:.2}",
                evaluation.statistics.len(),
                last.mean_fitness,
                last.length_mean
            );
        }
        if evaluation.cancelled {
            println!("(run was cancelled before completion)");
        }
    }

    Ok(())
}
