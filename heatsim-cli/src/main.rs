mod batch;
mod generate;
mod ic;
mod job;
mod plate;
mod report;
mod summary;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use heatsim_core::{Backend, ConvergenceRule, EngineConfig, SimulationEngine, SimulationParams};
use tracing::info;
use tracing_subscriber::EnvFilter;

use batch::{run_batch, BatchOptions};
use generate::{generate, GenerateOptions};
use ic::{IcType, Thermal};

#[derive(Parser, Debug)]
#[command(author, version, about = "Parallel steady-state heat diffusion on rectangular plates")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (error|warn|info|debug|trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate every plate listed in a job file
    Run(RunArgs),
    /// Write random plates and a job file for them
    Generate(GenerateArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Serial,
    Threads,
    Distributed,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Serial => Backend::Serial,
            BackendArg::Threads => Backend::Threads,
            BackendArg::Distributed => Backend::Distributed,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RuleArg {
    /// A cell whose change equals epsilon still counts as moving
    Inclusive,
    /// Only a change strictly above epsilon counts as moving
    Strict,
}

impl From<RuleArg> for ConvergenceRule {
    fn from(r: RuleArg) -> Self {
        match r {
            RuleArg::Inclusive => ConvergenceRule::Inclusive,
            RuleArg::Strict => ConvergenceRule::Strict,
        }
    }
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Job file: `<plate> <delta_t> <alpha> <h> <epsilon>` per line
    job: PathBuf,

    /// Output directory (defaults to the job file's directory)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Worker count (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, value_enum, default_value = "threads")]
    backend: BackendArg,

    #[arg(long, value_enum, default_value = "inclusive")]
    rule: RuleArg,

    /// Give up on a plate after this many iterations
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Also write `<job>.jsonl` with one JSON record per plate
    #[arg(long)]
    summary: bool,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Output directory
    #[arg(long)]
    out: PathBuf,

    /// Name of the job file written next to the plates
    #[arg(long, default_value = "job001.txt")]
    job_name: String,

    #[arg(long, default_value_t = 4)]
    plates: usize,

    #[arg(long, default_value_t = 64)]
    rows: usize,

    #[arg(long, default_value_t = 64)]
    columns: usize,

    /// Base RNG seed (reproducibility)
    #[arg(long, default_value_t = 123)]
    seed: u64,

    /// Pattern for every plate (sampled per plate when omitted)
    #[arg(long, value_enum)]
    ic: Option<IcType>,

    #[arg(long, default_value_t = 0.1)]
    delta_t: f64,

    #[arg(long, default_value_t = 0.1)]
    alpha: f64,

    #[arg(long, default_value_t = 1.0)]
    h: f64,

    #[arg(long, default_value_t = 0.01)]
    epsilon: f64,

    /// Hottest interior temperature
    #[arg(long, default_value_t = 100.0)]
    peak: f64,

    /// Fixed border temperature
    #[arg(long, default_value_t = 0.0)]
    border: f64,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let config = EngineConfig {
        workers: args.workers.unwrap_or_else(|| EngineConfig::default().workers),
        backend: args.backend.into(),
        rule: args.rule.into(),
        max_iterations: args.max_iterations,
    };
    info!(
        workers = config.workers,
        backend = config.backend.as_str(),
        rule = config.rule.as_str(),
        "engine configured"
    );
    let engine = SimulationEngine::new(config);

    let t0 = Instant::now();
    let outcome = run_batch(
        &engine,
        &BatchOptions {
            job: args.job,
            output: args.output,
            summary: args.summary,
        },
    )?;

    println!("Report: {}", outcome.report.display());
    println!(
        "{} plate(s) done, {} failed in {:.3}s",
        outcome.succeeded,
        outcome.failed,
        t0.elapsed().as_secs_f64()
    );
    if outcome.failed > 0 {
        bail!("{} plate(s) failed", outcome.failed);
    }
    Ok(())
}

fn generate_cmd(args: GenerateArgs) -> Result<()> {
    let job = generate(&GenerateOptions {
        out: args.out,
        job_name: args.job_name,
        plates: args.plates,
        rows: args.rows,
        columns: args.columns,
        seed: args.seed,
        ic: args.ic,
        thermal: Thermal {
            peak: args.peak,
            border: args.border,
        },
        params: SimulationParams::new(args.delta_t, args.alpha, args.h, args.epsilon),
    })?;
    println!("Job: {}", job.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Generate(args) => generate_cmd(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "heatsim",
            "run",
            "jobs/job001.txt",
            "--workers",
            "8",
            "--backend",
            "distributed",
            "--rule",
            "strict",
            "--max-iterations",
            "1000",
            "--summary",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.workers, Some(8));
        assert_eq!(Backend::from(args.backend), Backend::Distributed);
        assert_eq!(ConvergenceRule::from(args.rule), ConvergenceRule::Strict);
        assert_eq!(args.max_iterations, Some(1000));
        assert!(args.summary);
    }

    #[test]
    fn generate_ic_names_are_kebab_case() {
        let cli = Cli::try_parse_from([
            "heatsim", "generate", "--out", "data", "--ic", "smooth-noise",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.ic, Some(IcType::SmoothNoise));
    }
}
