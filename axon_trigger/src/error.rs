//! Error types for the remote trigger protocol

use axon_shm::ShmError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by trigger servers and clients.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// Shared memory layer failure (creation, attach, validation).
    #[error("shared memory error: {source}")]
    Shm {
        /// Underlying segment error.
        #[from]
        source: ShmError,
    },

    /// Configuration loading or validation failure.
    #[error("configuration error: {source}")]
    Config {
        /// Underlying config error.
        #[from]
        source: crate::config::ConfigError,
    },

    /// Operation requires a serving loop that is not in a usable state.
    #[error("server not ready: {reason}")]
    NotReady {
        /// What the caller must do first.
        reason: &'static str,
    },

    /// Spawning the serving thread failed.
    #[error("failed to spawn server thread: {source}")]
    Spawn {
        /// OS-level spawn failure.
        #[from]
        source: std::io::Error,
    },

    /// The serving thread panicked and its state is lost.
    #[error("server thread '{thread}' panicked")]
    ThreadPanic {
        /// Name of the thread that panicked.
        thread: String,
    },

    /// No response arrived within the client's deadline.
    #[error("trigger timed out after {timeout:?}")]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
    },
}

/// Convenience alias used throughout the crate.
pub type TriggerResult<T> = Result<T, TriggerError>;
