//! # AXON Shared Memory Signaling
//!
//! Cross-process signaling primitives for AXON's robotics runtime. This crate
//! provides named, typed shared memory segments backed by `/dev/shm` and a
//! futex-based [`BinaryFutex`] signal that lets one process wake another
//! without pipes, sockets or polling.
//!
//! ## Features
//!
//! - **Futex Wakeups**: Waiters sleep in the kernel and wake in microseconds,
//!   no busy-polling between requests
//! - **Coalescing Semantics**: Posting an already-signaled futex is a no-op,
//!   so a burst of posts yields exactly one wakeup token
//! - **Typed Segments**: Every segment records a layout hash of its payload
//!   type and attaching with the wrong type is rejected
//! - **Namespace Scoping**: Segments live under a namespace prefix so
//!   co-located deployments cannot collide
//! - **Lifecycle Ownership**: Segments created through a
//!   [`SegmentProvider`] are unlinked when the provider drops
//! - **Orphan Recovery**: Discovery detects segments whose creator died and
//!   reclaims them after a grace period
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐      ┌──────────────────┐      ┌─────────────────┐
//! │   Poster        │      │  Shared Memory   │      │   Waiter        │
//! │                 │      │    Segment       │      │                 │
//! │ ReadWriteSegment├─────►│                  ├─────►│ ReadOnlySegment │
//! │ .get().post()   │      │ [Header|Futex]   │      │ .get().wait()   │
//! └─────────────────┘      │ Type Hash        │      └─────────────────┘
//!                          │ Creator PID      │
//!                          └──────────────────┘
//!                                   │
//!                          ┌──────────────────┐
//!                          │ SegmentDiscovery │
//!                          │                  │
//!                          │ Scan / Reclaim   │
//!                          └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Post and Consume a Signal
//!
//! ```rust
//! use axon_shm::{BinaryFutex, SegmentProvider};
//!
//! # fn main() -> Result<(), axon_shm::ShmError> {
//! let provider = SegmentProvider::new("doc")?;
//! provider.ensure::<BinaryFutex>("signal_demo")?;
//!
//! let poster = provider.open_read_write::<BinaryFutex>("signal_demo")?;
//! let waiter = provider.open_read_only::<BinaryFutex>("signal_demo")?;
//!
//! poster.get().post();
//! assert!(waiter.get().try_wait());
//! # Ok(())
//! # }
//! ```
//!
//! ### Bounded Blocking Wait
//!
//! ```rust,no_run
//! use axon_shm::{BinaryFutex, SegmentProvider, WaitStatus};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), axon_shm::ShmError> {
//! let provider = SegmentProvider::new("axon")?;
//! let request = provider.open_read_only::<BinaryFutex>("trigger_request")?;
//!
//! match request.get().wait_timeout(Duration::from_millis(100)) {
//!     WaitStatus::Signaled => { /* handle the request */ }
//!     WaitStatus::TimedOut => { /* check shutdown flag, wait again */ }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ShmError>` with detailed error information:
//!
//! ```rust,no_run
//! use axon_shm::{BinaryFutex, SegmentProvider, ShmError};
//!
//! # fn main() -> Result<(), ShmError> {
//! let provider = SegmentProvider::new("axon")?;
//! match provider.open_read_only::<BinaryFutex>("trigger_request") {
//!     Ok(handle) => { /* wait on it */ }
//!     Err(ShmError::NotFound { name }) => {
//!         eprintln!("segment '{}' not found - check the server is running", name);
//!     }
//!     Err(ShmError::TypeMismatch { name, expected_hash, found_hash }) => {
//!         eprintln!(
//!             "segment '{}' holds a different payload type: {:#010x} != {:#010x}",
//!             name, found_hash, expected_hash
//!         );
//!     }
//!     Err(e) => eprintln!("unexpected error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **BinaryFutex**: Thread-safe - every operation takes `&self` and is a
//!   single atomic on the shared word
//! - **ReadOnlySegment / ReadWriteSegment**: `Send`; the access mode is a
//!   role marker (wait side vs post side), not a hardware protection
//! - **SegmentProvider**: Thread-safe with internal synchronization
//! - **SegmentDiscovery**: Stateless, safe for concurrent scans
//!
//! ## Platform Support
//!
//! Linux only. The implementation relies on:
//! - `futex(2)` with `FUTEX_WAIT` / `FUTEX_WAKE` (no private flag, the word
//!   is shared across address spaces)
//! - tmpfs-backed segments under `/dev/shm`
//! - `kill(pid, 0)` process liveness probes for orphan detection

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod discovery;
pub mod error;
pub mod futex;
pub mod platform;
pub mod provider;
pub mod segment;

pub use discovery::{DiscoveryStats, SegmentDiscovery, SegmentInfo};
pub use error::{ShmError, ShmResult};
pub use futex::{BinaryFutex, WaitStatus};
pub use provider::{DEFAULT_NAMESPACE, MAX_NAME_LEN, SegmentProvider, validate_name};
pub use segment::{
    ReadOnlySegment, ReadWriteSegment, SEGMENT_HEADER_SIZE, SEGMENT_MAGIC, SegmentHeader,
    Shareable, type_hash,
};

/// Initialize tracing for RT-safe logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
