use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use vicsek_core::{
    linspace, parameter_scan, run_ensemble, ExperimentConfig, ModelConfig, NeighborSearch,
    ScanParameter, VicsekModel,
};

const WARMUP_STEPS: usize = 10;
const BENCHMARK_STEPS: usize = 200;

#[derive(Parser)]
#[command(name = "vicsek")]
#[command(about = "Vicsek flocking model CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single model and sample its order parameter
    Run {
        /// Path to experiment config file (JSON); defaults are used when absent
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for results (optional)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Number of simulation steps to run
        #[arg(long, default_value_t = 1000)]
        steps: usize,

        /// Record the order parameter every N steps
        #[arg(long, default_value_t = 10)]
        sample_every: usize,
    },
    /// Run the ensemble described by the config's `ensemble` section
    Ensemble {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run one ensemble per value of a model parameter
    Scan {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum)]
        parameter: ScanArg,

        #[arg(long)]
        start: f64,

        #[arg(long)]
        stop: f64,

        /// Number of evenly spaced values from start to stop
        #[arg(long, default_value_t = 10)]
        num: usize,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Time the neighbor strategies on growing particle counts
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScanArg {
    Noise,
    Density,
    Radius,
    Speed,
    ParticleCount,
}

impl From<ScanArg> for ScanParameter {
    fn from(arg: ScanArg) -> Self {
        match arg {
            ScanArg::Noise => ScanParameter::Noise,
            ScanArg::Density => ScanParameter::Density,
            ScanArg::Radius => ScanParameter::Radius,
            ScanArg::Speed => ScanParameter::Speed,
            ScanArg::ParticleCount => ScanParameter::ParticleCount,
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    let config = match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open config file {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file)).context("failed to parse config")?
        }
        None => ExperimentConfig::default(),
    };
    config
        .model
        .validate()
        .context("Config validation error")?;
    Ok(config)
}

fn write_output<T: Serialize>(out: Option<&Path>, name: &str, value: &T) -> Result<()> {
    match out {
        Some(dir) => {
            std::fs::create_dir_all(dir).context("failed to create output directory")?;
            let path = dir.join(name);
            let file = File::create(&path).context("failed to create output file")?;
            serde_json::to_writer_pretty(file, value).context("failed to write output")?;
            println!("Results saved to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn run_benchmark(particles: usize, neighbor_search: NeighborSearch) -> Result<()> {
    let config = ModelConfig {
        length: (particles as f64).sqrt(),
        particle_count: Some(particles),
        neighbor_search,
        ..ModelConfig::default()
    };
    let mut model = VicsekModel::new(config).context("Benchmark config validation error")?;
    model.advance(WARMUP_STEPS)?;

    let mut total_neighbor = 0u64;
    let mut total_heading = 0u64;
    let mut total_integration = 0u64;
    let mut total_time = 0u64;
    for _ in 0..BENCHMARK_STEPS {
        model.step()?;
        let timings = model.last_timings();
        total_neighbor += timings.neighbor_us;
        total_heading += timings.heading_us;
        total_integration += timings.integration_us;
        total_time += timings.total_us;
    }

    let avg_step_us = total_time as f64 / BENCHMARK_STEPS as f64;
    let steps_per_sec = 1_000_000.0 / avg_step_us.max(1.0);
    println!("--- {particles} particles, {neighbor_search:?} ---");
    println!("  Avg step:      {avg_step_us:.0} us ({steps_per_sec:.1} steps/sec)");
    println!(
        "  Breakdown:     neighbors={:.0} us, headings={:.0} us, integration={:.0} us",
        total_neighbor as f64 / BENCHMARK_STEPS as f64,
        total_heading as f64 / BENCHMARK_STEPS as f64,
        total_integration as f64 / BENCHMARK_STEPS as f64,
    );
    println!("  Order:         {:.3}", model.order_parameter());
    println!();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = ExperimentConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p vicsek-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== Vicsek neighbor search benchmark ===");
            println!("Warmup: {WARMUP_STEPS} steps, Benchmark: {BENCHMARK_STEPS} steps");
            println!();
            for particles in [1_000, 4_000, 16_000] {
                for strategy in [NeighborSearch::CellGrid, NeighborSearch::RTree] {
                    run_benchmark(particles, strategy)?;
                }
                if particles <= 4_000 {
                    run_benchmark(particles, NeighborSearch::AllPairs)?;
                }
            }
        }
        Commands::Run {
            config,
            out,
            steps,
            sample_every,
        } => {
            let experiment = load_config(config.as_deref())?;
            info!(steps, sample_every, "starting run");
            let mut model = VicsekModel::new(experiment.model)?;
            let summary = model
                .run_experiment(steps, sample_every)
                .context("run failed")?;
            eprintln!(
                "Run complete. Final order parameter: {:.4}",
                summary.final_snapshot.order_parameter
            );
            write_output(out.as_deref(), "summary.json", &summary)?;
        }
        Commands::Ensemble { config, out } => {
            let experiment = load_config(config.as_deref())?;
            let run = run_ensemble(&experiment.model, &experiment.ensemble)
                .context("ensemble failed")?;
            let statistics = run
                .summary(experiment.ensemble.burn_in)
                .context("summary failed")?;
            eprintln!(
                "Ensemble complete. Mean order parameter after burn-in: {:.4} +/- {:.4}",
                statistics.mean, statistics.std_error
            );
            write_output(out.as_deref(), "ensemble.json", &run)?;
            write_output(out.as_deref(), "statistics.json", &statistics)?;
        }
        Commands::Scan {
            config,
            parameter,
            start,
            stop,
            num,
            out,
        } => {
            let experiment = load_config(config.as_deref())?;
            let values = linspace(start, stop, num);
            let points = parameter_scan(
                &experiment.model,
                parameter.into(),
                &values,
                &experiment.ensemble,
            )
            .context("scan failed")?;
            write_output(out.as_deref(), "scan.json", &points)?;
        }
    }
    Ok(())
}
