//! `mutsig` — signature weight estimation from the command line.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mutsig_common::ExperimentConfig;

const DEFAULT_CONFIG: &str = "mutsig.toml";

#[derive(Parser)]
#[command(name = "mutsig", version, about = "Mutational signature weight estimation")]
struct Cli {
    /// Experiment configuration (TOML, YAML or JSON)
    #[arg(long, global = true, env = "MUTSIG_CONFIG")]
    config: Option<PathBuf>,

    /// Compute device override: cpu, cuda[:N] or metal[:N]
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve NNLS baselines for one or more spectra tables
    Baseline {
        #[arg(long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        method: Option<String>,
        /// Per-sample time budget in milliseconds
        #[arg(long)]
        time_budget_ms: Option<u64>,
    },

    /// Train the variational generator
    TrainGenerator {
        #[arg(long)]
        train: Option<PathBuf>,
        #[arg(long)]
        val: Option<PathBuf>,
        #[arg(long)]
        model_dir: Option<PathBuf>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Refine baseline guesses with the low/large correctors
    Refine {
        #[arg(long)]
        inputs: PathBuf,
        #[arg(long)]
        baseline: PathBuf,
        #[arg(long)]
        num_mut: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Drop samples the realism classifier rejects before refining
        #[arg(long)]
        classifier_dir: Option<PathBuf>,
        #[arg(long)]
        cutoff: Option<f32>,
    },

    /// Compare guesses with labels and print a JSON report
    Evaluate {
        #[arg(long)]
        guess: PathBuf,
        #[arg(long)]
        label: PathBuf,
        #[arg(long, default_value_t = mutsig_metrics::DEFAULT_THRESHOLD)]
        threshold: f32,
        /// Also report metrics per mutation count
        #[arg(long)]
        num_mut: Option<PathBuf>,
    },

    /// Synthesize spectra with a trained generator
    Generate {
        #[arg(long)]
        model_dir: PathBuf,
        #[arg(long)]
        n: usize,
        #[arg(long)]
        output: PathBuf,
    },
}

/// `--config` / `MUTSIG_CONFIG`, else `mutsig.toml` when present, else defaults.
fn load_config(explicit: Option<&Path>) -> Result<ExperimentConfig> {
    if let Some(path) = explicit {
        return ExperimentConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    let fallback = Path::new(DEFAULT_CONFIG);
    if fallback.exists() {
        return ExperimentConfig::from_file(fallback)
            .with_context(|| format!("loading config {}", fallback.display()));
    }
    warn!("No {} found; using built-in defaults", DEFAULT_CONFIG);
    Ok(ExperimentConfig::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mutsig=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.execution.device = device;
    }
    info!("mutsig {} (device {})", env!("CARGO_PKG_VERSION"), config.execution.device);

    // Every command is CPU-bound; keep it off the async workers
    tokio::task::spawn_blocking(move || run(cli.command, config))
        .await
        .context("command task panicked")?
}

fn run(command: Command, mut config: ExperimentConfig) -> Result<()> {
    match command {
        Command::Baseline {
            inputs,
            workers,
            method,
            time_budget_ms,
        } => {
            if let Some(w) = workers {
                config.baseline.workers = w;
            }
            if let Some(m) = method {
                config.baseline.method = m;
            }
            if time_budget_ms.is_some() {
                config.baseline.time_budget_ms = time_budget_ms;
            }
            config.validate()?;
            commands::baseline(&config, &inputs)
        }
        Command::TrainGenerator {
            train,
            val,
            model_dir,
            iterations,
            seed,
        } => {
            let g = &mut config.generator;
            if train.is_some() {
                g.train_input = train;
            }
            if val.is_some() {
                g.val_input = val;
            }
            if model_dir.is_some() {
                g.model_dir = model_dir;
            }
            if let Some(it) = iterations {
                g.iterations = it;
            }
            if seed.is_some() {
                g.seed = seed;
            }
            config.validate()?;
            commands::train_generator(&config)
        }
        Command::Refine {
            inputs,
            baseline,
            num_mut,
            output,
            classifier_dir,
            cutoff,
        } => {
            if let Some(c) = cutoff {
                config.refine.cutoff = c;
            }
            if classifier_dir.is_some() {
                config.refine.classifier_dir = classifier_dir;
            }
            commands::refine(
                &config,
                &commands::RefinePaths {
                    inputs,
                    baseline,
                    num_mut,
                    output,
                },
            )
        }
        Command::Evaluate {
            guess,
            label,
            threshold,
            num_mut,
        } => commands::evaluate(&guess, &label, threshold, num_mut.as_deref()),
        Command::Generate {
            model_dir,
            n,
            output,
        } => commands::generate(&config, &model_dir, n, &output),
    }
}
