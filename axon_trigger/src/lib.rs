//! # AXON Remote Trigger
//!
//! A futex-based remote trigger protocol for AXON's robotics runtime: one
//! process fires a trigger, another wakes, runs a callback, and answers.
//! The whole round trip is two shared memory words and two futex syscalls,
//! with no sockets, no serialization and no allocation on the hot path.
//!
//! ## Features
//!
//! - **Kernel Wakeups**: The server sleeps in `futex(2)`, not in a poll
//!   loop; a trigger wakes it in microseconds
//! - **Always Answered**: The response is posted after every observed
//!   request, even when the callback fails, so clients never hang on a
//!   server-side error
//! - **Bounded Stop Latency**: The serve loop waits in bounded slices and
//!   honors a stop request within one poll interval, trigger or no trigger
//! - **Compile-Time Hazard Control**: One client, one in-flight trigger,
//!   enforced by `&mut` borrows instead of runtime checks
//! - **Full Lifecycle Control**: Synchronous or asynchronous serving, a
//!   non-blocking single-shot poll, cooperative stop, restart after join,
//!   and explicit ownership transfer
//! - **RT-Aware Serving**: Optional SCHED_FIFO priority and CPU pinning for
//!   the serving thread behind the `rt` feature
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐         ┌──────────────────────┐
//! │  Client Process      │         │  Server Process      │
//! │                      │ request │                      │
//! │ RemoteTriggerClient ─┼────────►┼─ RemoteTriggerServer │
//! │       .trigger()     │  futex  │    wait → callback   │
//! │                      │         │         │            │
//! │        wait ◄────────┼─────────┼─── post │            │
//! │                      │ response│                      │
//! └──────────────────────┘  futex  └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use axon_shm::SegmentProvider;
//! use axon_trigger::{RemoteTriggerClient, RemoteTriggerServer};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = SegmentProvider::new("doc")?;
//!
//! let mut server = RemoteTriggerServer::create(&provider, "doc_pulse", || {
//!     println!("triggered");
//!     Ok(())
//! })?;
//! server.start_async()?;
//!
//! let mut client = RemoteTriggerClient::attach(&provider, "doc_pulse")?;
//! client.trigger(Some(Duration::from_secs(2)))?;
//!
//! server.request_stop();
//! server.join_async_thread()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, TriggerError>`:
//!
//! ```rust,no_run
//! use axon_shm::SegmentProvider;
//! use axon_trigger::{RemoteTriggerClient, TriggerError};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = SegmentProvider::new("axon")?;
//! let mut client = RemoteTriggerClient::attach(&provider, "motion_sync")?;
//!
//! match client.trigger(Some(Duration::from_millis(100))) {
//!     Ok(()) => { /* server completed the callback */ }
//!     Err(TriggerError::Timeout { .. }) => {
//!         eprintln!("server busy or down; request stays posted");
//!     }
//!     Err(e) => eprintln!("trigger failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **RemoteTriggerServer**: owns the serve loop; `start` borrows it for
//!   the whole run, stopping from elsewhere goes through a [`StopHandle`]
//! - **StopHandle**: `Clone + Send + Sync`, safe to hand to signal handlers
//! - **RemoteTriggerClient**: NOT shareable - one trigger in flight per
//!   client, by construction
//!
//! ## Platform Support
//!
//! Linux only, on top of [`axon_shm`]'s `/dev/shm` segments and futex
//! signaling.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod stats;
pub mod thread;

pub use client::{PendingTrigger, RemoteTriggerClient};
pub use config::{ConfigError, ThreadConfig, TriggerConfig, load_config, load_config_from_str};
pub use error::{TriggerError, TriggerResult};
pub use server::{
    CallbackError, DEFAULT_POLL_INTERVAL, RemoteTriggerServer, ServerState, StopHandle,
    TriggerCallback,
};
pub use stats::TriggerStats;
pub use thread::{Scheduling, ThreadHandle, ThreadOptions};
