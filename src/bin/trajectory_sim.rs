//! Runs the reference engine offline and logs the targets it produces.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nalgebra::Vector3;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trajectory_publisher::{ReferenceEngine, TrajectoryConfig, TriggerRequest};

/// Offline trajectory publisher simulation
#[derive(Parser)]
#[command(name = "trajectory_sim")]
#[command(about = "Step the trajectory reference engine without a flight stack")]
struct Cli {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of fast ticks to simulate
    #[arg(short, long, default_value = "2000")]
    ticks: usize,

    /// Primitive to select before triggering
    #[arg(short, long, default_value = "0")]
    select: i64,

    /// Log the target every N ticks
    #[arg(long, default_value = "100")]
    every: usize,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrajectoryConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TrajectoryConfig::default(),
    };

    let mut engine = ReferenceEngine::new(&config).context("Failed to build reference engine")?;
    engine
        .select(cli.select)
        .context("Invalid primitive selection")?;

    let response = engine.trigger(TriggerRequest { start: true });
    info!(success = response.success, "{}", response.message);

    let period = config.update_period();
    let every = cli.every.max(1);
    for tick in 0..cli.ticks {
        let output = engine.advance(period);
        if tick % every == 0 {
            let target = output.target;
            info!(
                t = engine.simulated_time(),
                position = %fmt_vec(&target.position),
                velocity = %fmt_vec(&target.velocity),
                acceleration = %fmt_vec(&target.acceleration),
                "Target"
            );
        }
    }

    let info = engine.info();
    info!(
        laps = info.lap_count,
        windup_ratio = info.windup_ratio,
        velocity_scaler = info.velocity_scaler,
        simulated = ?Duration::from_secs_f64(engine.simulated_time()),
        "Simulation finished"
    );
    Ok(())
}

fn fmt_vec(v: &Vector3<f64>) -> String {
    format!("[{:.3}, {:.3}, {:.3}]", v.x, v.y, v.z)
}
