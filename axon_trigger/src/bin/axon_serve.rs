//! # AXON Trigger Server
//!
//! Serves a trigger channel with a counting callback. Runs until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Serve the default channel in the default namespace
//! axon_serve
//!
//! # Serve a specific channel with a tight poll interval
//! axon_serve --channel motion_sync --poll-interval-ms 20
//!
//! # From a config file, with CLI overrides on top
//! axon_serve --config /etc/axon/trigger.toml --namespace plant7
//!
//! # RT serving thread (requires the rt feature and privileges)
//! axon_serve --rt-priority 80 --cpu-core 2
//! ```

#![deny(warnings)]

use axon_shm::SegmentProvider;
use axon_trigger::channel::DEFAULT_CHANNEL;
use axon_trigger::config::{TriggerConfig, load_config, validate_config};
use axon_trigger::{RemoteTriggerServer, StopHandle};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// AXON Trigger Server — serve a trigger channel until stopped
#[derive(Parser, Debug)]
#[command(name = "axon_serve")]
#[command(author = "AXON Robotics")]
#[command(version)]
#[command(about = "Serve a remote trigger channel with a counting callback")]
struct Args {
    /// Path to a trigger configuration TOML. CLI flags override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Channel to serve.
    #[arg(short, long)]
    channel: Option<String>,

    /// Segment namespace.
    #[arg(short, long)]
    namespace: Option<String>,

    /// Bounded-wait slice of the serve loop [ms].
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// SCHED_FIFO priority for the serving thread (needs the rt feature).
    #[arg(long)]
    rt_priority: Option<i32>,

    /// CPU core to pin the serving thread to.
    #[arg(long)]
    cpu_core: Option<usize>,

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

    info!("AXON trigger server v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("AXON trigger server shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = effective_config(args)?;
    info!(
        channel = %config.channel,
        namespace = %config.namespace,
        poll_interval_ms = config.poll_interval_ms,
        "config OK"
    );

    let provider = SegmentProvider::new(&config.namespace)?;

    let served = Arc::new(AtomicU64::new(0));
    let served_cb = Arc::clone(&served);
    let mut server = RemoteTriggerServer::create(&provider, &config.channel, move || {
        let n = served_cb.fetch_add(1, Ordering::SeqCst) + 1;
        info!(served = n, "trigger received");
        Ok(())
    })?
    .with_poll_interval(config.poll_interval())
    .with_thread_options(config.thread_options());

    install_shutdown_handler(server.stop_handle())?;

    // Serve in a dedicated thread so the configured scheduling and affinity
    // apply to the loop; block here until the handler stops it.
    server.start_async()?;
    server.join_async_thread()?;

    info!(served = served.load(Ordering::SeqCst), "serve loop finished");
    Ok(())
}

/// Merge config file (or defaults) with CLI overrides, then re-validate.
fn effective_config(args: &Args) -> Result<TriggerConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading trigger config from {}", path.display());
            load_config(path)?
        }
        None => TriggerConfig::with_channel(DEFAULT_CHANNEL),
    };

    if let Some(ref channel) = args.channel {
        config.channel = channel.clone();
    }
    if let Some(ref namespace) = args.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(poll) = args.poll_interval_ms {
        config.poll_interval_ms = poll;
    }
    if let Some(priority) = args.rt_priority {
        config.thread.fifo_priority = Some(priority);
    }
    if let Some(core) = args.cpu_core {
        config.thread.cpu_affinity = Some(core);
    }

    validate_config(&config)?;
    Ok(config)
}

/// Route Ctrl-C to a cooperative stop request.
fn install_shutdown_handler(stop: StopHandle) -> Result<(), Box<dyn std::error::Error>> {
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop.request_stop();
    })?;
    Ok(())
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
