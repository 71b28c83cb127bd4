//! # AXON Segment Inspector
//!
//! Lists the signal segments of a namespace, flags dead creators, and
//! optionally reclaims orphaned segments.
//!
//! # Usage
//!
//! ```bash
//! # List all segments in the default namespace
//! axon_segments
//!
//! # Machine-readable listing of another namespace
//! axon_segments --namespace plant7 --json
//!
//! # Reclaim segments whose creator died past the grace period
//! axon_segments --cleanup
//! ```

#![deny(warnings)]

use axon_shm::platform::is_process_alive;
use axon_shm::{SegmentDiscovery, SegmentInfo};
use clap::Parser;
use serde::Serialize;
use std::process;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// AXON Segment Inspector — list and reclaim signal segments
#[derive(Parser, Debug)]
#[command(name = "axon_segments")]
#[command(author = "AXON Robotics")]
#[command(version)]
#[command(about = "Inspect the signal segments of a namespace")]
struct Args {
    /// Segment namespace to inspect.
    #[arg(short, long, default_value = "axon")]
    namespace: String,

    /// Remove segments whose creator died past the grace period.
    #[arg(long)]
    cleanup: bool,

    /// Output the listing as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

/// One listing row, shaped for both the table and the JSON output.
#[derive(Debug, Serialize)]
struct SegmentRow {
    name: String,
    size: usize,
    creator_pid: u32,
    creator_alive: bool,
    age_secs: u64,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let discovery = SegmentDiscovery::new(&args.namespace);

    if args.cleanup {
        let cleaned = discovery.cleanup_orphaned()?;
        info!(cleaned, "orphan cleanup finished");
    }

    let rows: Vec<SegmentRow> = discovery
        .list_segments()?
        .into_iter()
        .map(segment_row)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_table(&args.namespace, &rows);
    }

    Ok(())
}

fn segment_row(info: SegmentInfo) -> SegmentRow {
    let age_secs = info
        .created_at
        .elapsed()
        .map(|age| age.as_secs())
        .unwrap_or(0);
    SegmentRow {
        creator_alive: info.creator_pid != 0 && is_process_alive(info.creator_pid),
        name: info.name,
        size: info.size,
        creator_pid: info.creator_pid,
        age_secs,
    }
}

fn print_table(namespace: &str, rows: &[SegmentRow]) {
    if rows.is_empty() {
        println!("No segments in namespace [{namespace}]");
        return;
    }

    println!("Segments in namespace [{namespace}]:");
    println!("{:<40} {:>8} {:>8} {:>7} {:>8}", "NAME", "SIZE", "PID", "ALIVE", "AGE[s]");
    for row in rows {
        println!(
            "{:<40} {:>8} {:>8} {:>7} {:>8}",
            row.name,
            row.size,
            row.creator_pid,
            if row.creator_alive { "yes" } else { "no" },
            row.age_secs,
        );
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
