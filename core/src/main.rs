//! GNSS-INS: command line driver for the tightly-coupled navigation filter.
//!
//! - `solve` computes a single-epoch least-squares position, velocity and clock solution.
//! - `replay` runs the error-state filter over a JSON-lines stream of IMU samples and GNSS
//!   epochs and writes one binary result record per applied epoch.
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{LevelFilter, error, info};
use serde::Serialize;

use gnss_ins::NavigationFilter;
use gnss_ins::config::FilterConfig;
use gnss_ins::least_squares::PvtSolution;
use gnss_ins::messages::{EventStream, replay};
use gnss_ins::observation::ObservationEpoch;
use gnss_ins::record::NavResult;

const LONG_ABOUT: &str = "GNSS-INS: tightly-coupled GNSS/INS navigation.

- solve: weighted Gauss-Newton least squares over one epoch of pseudoranges and pseudorange
  rates, printed as JSON.

- replay: strapdown mechanization and error-state Kalman filtering over a JSON-lines event
  stream. The filter is seeded from the first epoch that yields a least-squares solution,
  then every following epoch is fused directly. Results are written as fixed-layout binary
  records (twelve little-endian f64 per epoch) and optionally as CSV.

Filter settings are read from a TOML/JSON/YAML configuration file; defaults apply to
anything the file leaves out.";

#[derive(Parser)]
#[command(author, version, about = "Tightly-coupled GNSS/INS navigation.", long_about = LONG_ABOUT)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Filter configuration file (TOML/JSON/YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: LevelFilter,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Least-squares position/velocity/clock from one observation epoch
    Solve {
        /// Observation epoch as JSON
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Run the navigation filter over an event stream
    Replay {
        /// Event stream as JSON lines
        #[arg(short, long)]
        input: PathBuf,
        /// Binary result records
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the results as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct SolutionReport {
    latitude_deg: f64,
    longitude_deg: f64,
    altitude_m: f64,
    velocity_ned: [f64; 3],
    clock_bias_m: f64,
    clock_drift_mps: f64,
    /// One-sigma of the ECEF position, velocity and clock states
    sigma: Vec<f64>,
    iterations: usize,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logger(cli.log_level, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logger: {e:#}");
    }
    if let Err(e) = run(&cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => FilterConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => FilterConfig::default(),
    };
    match &cli.command {
        Command::Solve { input } => solve(&config, input),
        Command::Replay { input, output, csv } => {
            run_replay(&config, input, output, csv.as_deref())
        }
    }
}

fn solve(config: &FilterConfig, input: &Path) -> Result<()> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("opening epoch {}", input.display()))?;
    let epoch: ObservationEpoch = serde_json::from_reader(file)
        .with_context(|| format!("parsing epoch {}", input.display()))?;
    let solution = PvtSolution::solve(&epoch, &config.least_squares)
        .with_context(|| format!("solving epoch at t = {}", epoch.time))?;
    let ellipsoid = config.ellipsoid.unwrap_or_default();
    let (latitude, longitude, altitude) = solution.geodetic(&ellipsoid);
    let velocity = solution.ned_velocity(&ellipsoid);
    let report = SolutionReport {
        latitude_deg: latitude.to_degrees(),
        longitude_deg: longitude.to_degrees(),
        altitude_m: altitude,
        velocity_ned: [velocity[0], velocity[1], velocity[2]],
        clock_bias_m: solution.clock_bias,
        clock_drift_mps: solution.clock_drift,
        sigma: solution.covariance.diagonal().iter().map(|v| v.sqrt()).collect(),
        iterations: solution.iterations,
    };
    info!(
        "converged in {} iterations with {} satellites",
        solution.iterations,
        epoch.len()
    );
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;
    Ok(())
}

fn run_replay(
    config: &FilterConfig,
    input: &Path,
    output: &Path,
    csv: Option<&Path>,
) -> Result<()> {
    let stream = EventStream::from_jsonl(input)
        .with_context(|| format!("reading events {}", input.display()))?;
    let (imu, gnss) = stream.counts();
    info!("loaded {imu} IMU samples and {gnss} GNSS epochs from {}", input.display());
    if let (Some(first), Some(last)) = (stream.events.first(), stream.events.last()) {
        info!(
            "events span {:.3} s to {:.3} s",
            first.elapsed_s(),
            last.elapsed_s()
        );
    }

    let mut filter = NavigationFilter::from_config(config);
    let results = replay(&mut filter, &stream, &config.least_squares);
    NavResult::to_binary(&results, output)
        .with_context(|| format!("writing records {}", output.display()))?;
    info!("wrote {} records to {}", results.len(), output.display());
    if let Some(path) = csv {
        NavResult::to_csv(&results, path)
            .with_context(|| format!("writing CSV {}", path.display()))?;
    }
    info!("final state: {filter}");
    Ok(())
}

/// Send log records to stderr, or append them to `log_file` when one is given.
fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let target = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            env_logger::Target::Pipe(Box::new(file))
        }
        None => env_logger::Target::Stderr,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}: {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(target)
        .try_init()?;
    Ok(())
}
