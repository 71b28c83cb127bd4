//! Serving thread runner.
//!
//! Spawns named threads for asynchronous serving loops and applies the
//! requested scheduling inside the new thread, where `sched_setscheduler`
//! and `sched_setaffinity` on TID 0 land on the right task.
//!
//! Scheduling setup is best-effort: a server that cannot get SCHED_FIFO
//! (missing privileges, non-RT kernel) still serves, it just logs the
//! degradation. Without the `rt` feature all scheduling calls are no-ops.

use crate::error::{TriggerError, TriggerResult};
use std::thread::JoinHandle;
use tracing::warn;

/// Scheduling policy for a serving thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// Inherit the default CFS scheduling.
    Normal,
    /// SCHED_FIFO with the given priority (1..=99).
    Fifo {
        /// Real-time priority, higher preempts lower.
        priority: i32,
    },
}

/// Options for spawning a serving thread.
#[derive(Debug, Clone)]
pub struct ThreadOptions {
    /// OS thread name, visible in `ps -T` and trace output.
    pub name: String,
    /// Scheduling policy applied inside the thread.
    pub scheduling: Scheduling,
    /// CPU core to pin the thread to.
    pub cpu_affinity: Option<usize>,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            name: "axon_trigger".to_string(),
            scheduling: Scheduling::Normal,
            cpu_affinity: None,
        }
    }
}

/// Handle for a spawned serving thread.
#[derive(Debug)]
pub struct ThreadHandle<T> {
    inner: JoinHandle<T>,
    name: String,
}

impl<T> ThreadHandle<T> {
    /// Name the thread was spawned with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has finished running.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the thread and take its result.
    pub fn join(self) -> TriggerResult<T> {
        self.inner.join().map_err(|_| TriggerError::ThreadPanic {
            thread: self.name,
        })
    }
}

/// Spawn a thread running `f` with the given options applied.
pub fn spawn<F, T>(options: ThreadOptions, f: F) -> TriggerResult<ThreadHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let name = options.name.clone();
    let inner = std::thread::Builder::new()
        .name(options.name.clone())
        .spawn(move || {
            apply_thread_options(&options);
            f()
        })?;

    Ok(ThreadHandle { inner, name })
}

/// Apply affinity and scheduling to the current thread, logging any
/// degradation instead of failing the spawn.
fn apply_thread_options(options: &ThreadOptions) {
    if let Some(cpu) = options.cpu_affinity
        && let Err(e) = set_affinity(cpu)
    {
        warn!(thread = %options.name, cpu, "cpu pinning degraded: {e}");
    }
    if let Scheduling::Fifo { priority } = options.scheduling
        && let Err(e) = set_fifo(priority)
    {
        warn!(thread = %options.name, priority, "rt scheduling degraded: {e}");
    }
}

/// Pin the current thread to a specific CPU core.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn set_affinity(cpu: usize) -> Result<(), String> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| format!("CpuSet::set({cpu}) failed: {e}"))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| format!("sched_setaffinity failed: {e}"))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn set_affinity(_cpu: usize) -> Result<(), String> {
    Ok(()) // No-op in simulation mode
}

/// Set SCHED_FIFO with the given priority for the current thread.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn set_fifo(priority: i32) -> Result<(), String> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        ));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn set_fifo(priority: i32) -> Result<(), String> {
    warn!("built without the rt feature, SCHED_FIFO {priority} request ignored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_thread_returns_its_result() {
        let handle = spawn(ThreadOptions::default(), || 21 * 2).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn thread_carries_configured_name() {
        let options = ThreadOptions {
            name: "axon_named".to_string(),
            ..Default::default()
        };
        let handle = spawn(options, || {
            std::thread::current().name().map(str::to_string)
        })
        .unwrap();

        assert_eq!(handle.name(), "axon_named");
        assert_eq!(handle.join().unwrap().as_deref(), Some("axon_named"));
    }

    #[test]
    fn panic_surfaces_as_thread_panic() {
        let options = ThreadOptions {
            name: "axon_doomed".to_string(),
            ..Default::default()
        };
        let handle = spawn::<_, ()>(options, || panic!("boom")).unwrap();

        match handle.join() {
            Err(TriggerError::ThreadPanic { thread }) => assert_eq!(thread, "axon_doomed"),
            other => panic!("expected ThreadPanic, got {other:?}"),
        }
    }

    #[test]
    fn fifo_request_degrades_without_privileges() {
        // Must still run the closure whether or not FIFO could be applied.
        let options = ThreadOptions {
            name: "axon_rt_test".to_string(),
            scheduling: Scheduling::Fifo { priority: 10 },
            cpu_affinity: Some(0),
        };
        let handle = spawn(options, || "served").unwrap();
        assert_eq!(handle.join().unwrap(), "served");
    }
}
