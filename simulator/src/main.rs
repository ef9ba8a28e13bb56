//! EscrowCore Simulator
//!
//! Load and contention harness driving an in-process engine.

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use escrowcore_common::targets;

mod controller;
mod metrics;
mod scenario;
mod users;

use controller::SimulationController;
use scenario::Scenario;

/// EscrowCore Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "EscrowCore load and contention simulator")]
struct Args {
    /// Scenario to run (happy_path, contended_buyer, dispute_storm, mixed_load)
    #[arg(short, long, default_value = "happy_path")]
    scenario: String,

    /// Number of simulated users to create
    #[arg(short, long, default_value = "8")]
    users: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Run duration in seconds (mixed_load only)
    #[arg(long, default_value = "5")]
    duration_secs: u64,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let scenario = Scenario::parse(&args.scenario)?;

    info!("Starting EscrowCore Simulator");
    info!("Users: {}", args.users);

    let controller = SimulationController::new(args.users, args.seed);
    info!("Seed: {}", controller.seed());

    controller.initialize().await?;

    let started = Instant::now();
    controller
        .run(scenario, Duration::from_secs(args.duration_secs))
        .await?;
    let elapsed = started.elapsed();

    controller.verify().await?;

    // Print metrics
    let metrics = controller.get_metrics().await;
    info!("Simulation complete in {:.2}s", elapsed.as_secs_f64());
    info!(
        "Operations: {} total, {} ok, {} rejected, {} conflicts",
        metrics.total_operations(),
        metrics.succeeded(),
        metrics.failed,
        metrics.conflicts
    );
    info!(
        "By kind: {} deposits, {} commits, {} releases, {} disputes, {} cancels, {} resolves",
        metrics.deposits,
        metrics.commits,
        metrics.releases,
        metrics.disputes,
        metrics.cancels,
        metrics.resolves
    );
    info!(
        "Latency: avg {}us, p50 {}us, p99 {}us",
        metrics.average_latency_us(),
        metrics.p50_latency_us(),
        metrics.p99_latency_us()
    );
    info!(
        "Success rate: {:.1}%, throughput: {:.0} ops/s",
        metrics.success_rate() * 100.0,
        metrics.throughput(elapsed.as_secs_f64())
    );

    let p50_target_us = (targets::LATENCY_P50_MS * 1000) as u64;
    let p99_target_us = (targets::LATENCY_P99_MS * 1000) as u64;
    if metrics.p50_latency_us() > p50_target_us {
        warn!(
            "p50 latency {}us exceeds the {}ms target",
            metrics.p50_latency_us(),
            targets::LATENCY_P50_MS
        );
    }
    if metrics.p99_latency_us() > p99_target_us {
        warn!(
            "p99 latency {}us exceeds the {}ms target",
            metrics.p99_latency_us(),
            targets::LATENCY_P99_MS
        );
    }

    Ok(())
}
