//! TOML configuration loader with validation.
//!
//! Loads `TriggerConfig` from a TOML file or string. Validates channel and
//! namespace names, poll interval bounds, and serving-thread parameters
//! before anything touches shared memory.

use crate::server::DEFAULT_POLL_INTERVAL;
use crate::thread::{Scheduling, ThreadOptions};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    /// File I/O error.
    IoError(String),
    /// TOML parse error.
    ParseError(String),
    /// Parameter validation error.
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "config I/O error: {e}"),
            Self::ParseError(e) => write!(f, "config parse error: {e}"),
            Self::ValidationError(e) => write!(f, "config validation: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ─── Config Structs ─────────────────────────────────────────────────

/// Longest thread name the kernel will actually display (comm is 16 bytes
/// including the terminator).
const MAX_THREAD_NAME_LEN: usize = 15;

/// Bounds for the serve loop's poll interval [ms].
const POLL_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=10_000;

/// Valid SCHED_FIFO priorities on Linux.
const FIFO_PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 1..=99;

/// Top-level trigger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Channel name shared by server and client.
    pub channel: String,
    /// Segment namespace, shared by every process of one deployment.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Bounded-wait slice of the serve loop [ms].
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Serving thread parameters.
    #[serde(default)]
    pub thread: ThreadConfig,
}

/// `[thread]` table: how the asynchronous serving thread is set up.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadConfig {
    /// OS thread name (defaults to the crate-wide default).
    pub name: Option<String>,
    /// SCHED_FIFO priority; absent means normal scheduling.
    pub fifo_priority: Option<i32>,
    /// CPU core to pin the serving thread to.
    pub cpu_affinity: Option<usize>,
}

fn default_namespace() -> String {
    axon_shm::DEFAULT_NAMESPACE.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl TriggerConfig {
    /// Config with defaults for everything but the channel.
    pub fn with_channel(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            namespace: default_namespace(),
            poll_interval_ms: default_poll_interval_ms(),
            thread: ThreadConfig::default(),
        }
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Map the `[thread]` table onto [`ThreadOptions`].
    pub fn thread_options(&self) -> ThreadOptions {
        let defaults = ThreadOptions::default();
        ThreadOptions {
            name: self.thread.name.clone().unwrap_or(defaults.name),
            scheduling: match self.thread.fifo_priority {
                Some(priority) => Scheduling::Fifo { priority },
                None => Scheduling::Normal,
            },
            cpu_affinity: self.thread.cpu_affinity,
        }
    }
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate a trigger configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<TriggerConfig, ConfigError> {
    let toml = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(format!("failed to read {}: {e}", path.display())))?;
    load_config_from_str(&toml)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(toml: &str) -> Result<TriggerConfig, ConfigError> {
    let config: TriggerConfig = toml::from_str(toml)
        .map_err(|e| ConfigError::ParseError(format!("trigger config: {e}")))?;
    validate_config(&config)?;
    Ok(config)
}

// ─── Validation ─────────────────────────────────────────────────────

/// Run all validation rules against a parsed configuration.
pub fn validate_config(config: &TriggerConfig) -> Result<(), ConfigError> {
    crate::channel::validate_channel(&config.channel)
        .map_err(|e| ConfigError::ValidationError(format!("channel: {e}")))?;
    axon_shm::validate_name(&config.namespace)
        .map_err(|e| ConfigError::ValidationError(format!("namespace: {e}")))?;

    if !POLL_INTERVAL_RANGE_MS.contains(&config.poll_interval_ms) {
        return Err(ConfigError::ValidationError(format!(
            "poll_interval_ms {} out of range [{}, {}]",
            config.poll_interval_ms,
            POLL_INTERVAL_RANGE_MS.start(),
            POLL_INTERVAL_RANGE_MS.end(),
        )));
    }

    if let Some(priority) = config.thread.fifo_priority
        && !FIFO_PRIORITY_RANGE.contains(&priority)
    {
        return Err(ConfigError::ValidationError(format!(
            "fifo_priority {} out of range [{}, {}]",
            priority,
            FIFO_PRIORITY_RANGE.start(),
            FIFO_PRIORITY_RANGE.end(),
        )));
    }

    if let Some(ref name) = config.thread.name {
        if name.is_empty() {
            return Err(ConfigError::ValidationError(
                "thread name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_THREAD_NAME_LEN {
            return Err(ConfigError::ValidationError(format!(
                "thread name '{name}' exceeds {MAX_THREAD_NAME_LEN} bytes (kernel comm limit)"
            )));
        }
    }

    Ok(())
}
