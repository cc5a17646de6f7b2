use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use infraguard::config::{InfraGuardConfig, LoggingConfig};
use infraguard::monitor::LiveMonitor;
use infraguard::pipeline::{recent_anomalies, HealthSummary};
use infraguard::simulate::Simulator;
use infraguard::{Reading, ReadingBuffer};

#[derive(Parser)]
#[command(
    name = "infraguard",
    about = "Structural health monitoring: anomaly scoring and health classification for bridge sensors",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $INFRAGUARD_CONFIG, then ./infraguard.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic sensor history, then score and classify it
    Simulate {
        /// Number of readings to generate
        #[arg(long)]
        samples: Option<usize>,

        /// Seed for the data generator
        #[arg(long)]
        seed: Option<u64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Latest readings to print
        #[arg(long, default_value = "10")]
        tail: usize,
    },

    /// Score and classify readings from a JSON file (array of readings)
    Analyze {
        /// Input file
        #[arg(long)]
        input: PathBuf,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Latest readings to print
        #[arg(long, default_value = "10")]
        tail: usize,
    },

    /// Append simulated live readings and rescore on every refresh
    Watch {
        /// Number of refresh cycles
        #[arg(long, default_value = "10")]
        ticks: usize,

        /// Seconds between refreshes (default: simulation.refresh_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a HealthSummary,
    readings: &'a [Reading],
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let resolved = InfraGuardConfig::resolve(cli.config.as_deref())?;
    init_tracing(&resolved.config.logging);
    resolved.log();
    let config = resolved.config;

    match cli.command {
        Commands::Simulate {
            samples,
            seed,
            json,
            tail,
        } => {
            let mut sim_config = config.simulation.clone();
            if let Some(s) = seed {
                sim_config.seed = s;
            }
            let samples = samples.unwrap_or(sim_config.samples);
            tracing::info!(samples, seed = sim_config.seed, "Generating synthetic readings");

            let mut sim = Simulator::new(sim_config)?;
            let mut buffer = ReadingBuffer::with_capacity(config.buffer.capacity)?;
            buffer.extend(sim.history(samples))?;
            report(&config, &mut buffer, json, tail)?;
        }
        Commands::Analyze { input, json, tail } => {
            tracing::info!(input = %input.display(), "Analyzing readings");
            let readings = read_readings(&input)?;
            let mut buffer = ReadingBuffer::with_capacity(config.buffer.capacity)?;
            let evicted = buffer
                .extend(readings)
                .with_context(|| format!("readings in {} are not time-ordered", input.display()))?;
            if evicted > 0 {
                tracing::warn!(
                    evicted,
                    capacity = buffer.capacity(),
                    "Input exceeds buffer capacity, oldest readings dropped"
                );
            }
            report(&config, &mut buffer, json, tail)?;
        }
        Commands::Watch {
            ticks,
            interval_secs,
        } => {
            let interval = Duration::from_secs(interval_secs.unwrap_or(config.simulation.refresh_secs));
            let mut sim = Simulator::new(config.simulation.clone())?;
            let mut buffer = ReadingBuffer::with_capacity(config.buffer.capacity)?;
            buffer.extend(sim.history(config.simulation.samples))?;

            tracing::info!(ticks, interval_secs = interval.as_secs(), "Starting live monitor");
            let monitor = LiveMonitor::new(buffer, config.pipeline(), sim);
            let summaries = monitor.run(ticks, interval).await?;
            if let Some(last) = summaries.last() {
                print_summary(last);
            }
        }
        Commands::Config => {
            let text = toml::to_string_pretty(&config).context("failed to render config")?;
            println!("{}", text);
        }
    }

    Ok(())
}

fn read_readings(path: &Path) -> Result<Vec<Reading>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let readings: Vec<Reading> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse readings from {}", path.display()))?;
    Ok(readings)
}

fn report(config: &InfraGuardConfig, buffer: &mut ReadingBuffer, json: bool, tail: usize) -> Result<()> {
    let summary = config.pipeline().run(buffer.as_mut_slice())?;

    if json {
        let readings = buffer.to_vec();
        let out = JsonReport {
            summary: &summary,
            readings: &readings,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_summary(&summary);

    println!("\nLatest {} readings:", tail.min(buffer.len()));
    print_table(buffer.latest(tail));

    let readings = buffer.to_vec();
    let anomalies = recent_anomalies(&readings, 5);
    if !anomalies.is_empty() {
        println!("\nRecent anomalies:");
        print_table(anomalies.into_iter());
    }
    println!();
    Ok(())
}

fn print_summary(s: &HealthSummary) {
    println!("\n=== InfraGuard Health Report ===");
    println!("Readings:      {}", s.total);
    println!("Anomaly rate:  {:.1}%", s.anomaly_rate_pct);
    println!("Good health:   {:.1}%", s.good_health_pct);
    println!("Overall risk:  {:.1}%", s.risk_pct);
    println!(
        "Distribution:  Good {} | Warning {} | Critical {}",
        s.good, s.warning, s.critical
    );
    if let Some(ts) = s.last_update {
        println!("Last update:   {}", ts.format("%Y-%m-%d %H:%M:%S"));
    }
}

fn print_table<'a>(readings: impl Iterator<Item = &'a Reading>) {
    println!(
        "{:<19} | {:>7} | {:>6} | {:>6} | {:>5} | {:>7} | {:<8}",
        "Timestamp", "|acc|", "Temp", "Hum", "Wind", "Anomaly", "Health"
    );
    println!("{:-<19}-|-{:->7}-|-{:->6}-|-{:->6}-|-{:->5}-|-{:->7}-|-{:-<8}", "", "", "", "", "", "", "");
    for r in readings {
        let anomaly = match r.anomaly {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };
        let health = r.health.map(|h| h.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<19} | {:>7.3} | {:>6.1} | {:>6.1} | {:>5.1} | {:>7} | {:<8}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.vibration_magnitude(),
            r.temp,
            r.humidity,
            r.wind_speed,
            anomaly,
            health
        );
    }
}
