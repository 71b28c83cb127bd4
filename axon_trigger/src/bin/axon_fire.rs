//! # AXON Trigger Client
//!
//! Fires triggers at a served channel and reports round-trip latency.
//!
//! # Usage
//!
//! ```bash
//! # Fire one trigger at the default channel and wait for completion
//! axon_fire
//!
//! # Fire 1000 triggers, 10 ms apart, each with a 50 ms deadline
//! axon_fire --count 1000 --interval-ms 10 --timeout-ms 50
//!
//! # Fire at a channel in another namespace, waiting without bound
//! axon_fire --channel conveyor_step --namespace plant7 --timeout-ms 0
//! ```

#![deny(warnings)]

use axon_shm::SegmentProvider;
use axon_trigger::channel::DEFAULT_CHANNEL;
use axon_trigger::{RemoteTriggerClient, TriggerError, TriggerStats};
use clap::Parser;
use std::process;
use std::time::{Duration, Instant};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// AXON Trigger Client — fire triggers and measure round-trip latency
#[derive(Parser, Debug)]
#[command(name = "axon_fire")]
#[command(author = "AXON Robotics")]
#[command(version)]
#[command(about = "Fire remote triggers at a served channel")]
struct Args {
    /// Channel to trigger.
    #[arg(short, long, default_value = DEFAULT_CHANNEL)]
    channel: String,

    /// Segment namespace.
    #[arg(short, long, default_value = "axon")]
    namespace: String,

    /// Number of triggers to fire.
    #[arg(long, default_value_t = 1)]
    count: u64,

    /// Pause between triggers [ms].
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Per-trigger completion deadline [ms]. 0 waits without bound.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("AXON trigger client v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let provider = SegmentProvider::new(&args.namespace)?;
    let mut client = RemoteTriggerClient::attach(&provider, &args.channel)?;

    let timeout = match args.timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };

    let mut stats = TriggerStats::new();
    for i in 0..args.count {
        let start = Instant::now();
        match client.trigger(timeout) {
            Ok(()) => {
                let latency_ns = start.elapsed().as_nanos() as u64;
                stats.record(latency_ns);
                info!(trigger = i + 1, latency_us = latency_ns / 1_000, "completed");
            }
            Err(TriggerError::Timeout { timeout }) => {
                stats.record_timeout();
                warn!(trigger = i + 1, ?timeout, "no completion within deadline");
            }
            Err(e) => return Err(e.into()),
        }

        if args.interval_ms > 0 && i + 1 < args.count {
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }

    report(&stats);
    Ok(())
}

fn report(stats: &TriggerStats) {
    if stats.count == 0 {
        info!(timeouts = stats.timeouts, "no trigger completed");
        return;
    }
    info!(
        completed = stats.count,
        timeouts = stats.timeouts,
        min_us = stats.min_ns / 1_000,
        avg_us = stats.avg_ns() / 1_000,
        max_us = stats.max_ns / 1_000,
        "trigger report"
    );
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
