//! Remote trigger server.
//!
//! The server end of a trigger channel: waits on the request futex, runs
//! the registered callback once per observed request, then posts the
//! response futex. The response is posted whether or not the callback
//! succeeded, so a client blocked on the round trip is always released.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted ── start() / start_async() ──► RunningSync / RunningAsync
//!     ▲                                              │ request_stop()
//!     │ take()                                       ▼
//!     └─────────── start() / start_async() ◄──── Stopped ◄── StopRequested
//! ```
//!
//! A stopped server can be started again; an asynchronous run must be
//! joined with [`RemoteTriggerServer::join_async_thread`] first, and
//! starting before that join fails with [`TriggerError::NotReady`].
//! Stopping is cooperative through a [`StopHandle`], and because the serve
//! loop waits in bounded slices of [`DEFAULT_POLL_INTERVAL`], a stop
//! request is honored within one poll interval even when no trigger ever
//! arrives. The stop check runs before each wait, so a consumed request is
//! always answered before the loop exits.
//!
//! While no loop is running, [`RemoteTriggerServer::query`] serves a single
//! pending request without blocking.
//!
//! ## Moving a server
//!
//! Ownership of the serving state can be handed to another owner with
//! [`RemoteTriggerServer::take`], which stops any serving thread first and
//! leaves the source hollow. The destination starts a fresh lifecycle and
//! must be started explicitly; operations on the hollow source fail with
//! [`TriggerError::NotReady`].

use crate::channel::{self, request_segment_name, response_segment_name};
use crate::error::{TriggerError, TriggerResult};
use crate::thread::{ThreadHandle, ThreadOptions};
use axon_shm::{BinaryFutex, ReadOnlySegment, ReadWriteSegment, SegmentProvider, WaitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on how long the serve loop stays parked in one futex wait.
/// Bounds the latency of a stop request when no triggers arrive.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Error type trigger callbacks may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked once per observed request.
pub type TriggerCallback = Box<dyn FnMut() -> Result<(), CallbackError> + Send>;

type ErrorHook = Box<dyn Fn(&(dyn std::error::Error + Send + Sync)) + Send + Sync>;

/// Observable lifecycle state of a [`RemoteTriggerServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No serve loop has run yet.
    NotStarted,
    /// Serve loop running in the thread that called [`RemoteTriggerServer::start`].
    RunningSync,
    /// Serve loop running in a spawned thread.
    RunningAsync,
    /// Stop requested, loop still draining its current slice.
    StopRequested,
    /// Serve loop exited. Startable again once any serving thread is joined.
    Stopped,
}

/// Flags shared between the server object, its serve loop and stop handles.
#[derive(Debug)]
struct ServerFlags {
    /// Serve loop is between its start and stop banners.
    running: AtomicBool,
    /// Cooperative stop request.
    stop: AtomicBool,
}

impl ServerFlags {
    const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }
}

/// Cloneable handle that can stop a server from any thread.
///
/// Obtained from [`RemoteTriggerServer::stop_handle`] before the server is
/// started; this is the only way to stop a synchronous serve loop, since
/// [`RemoteTriggerServer::start`] borrows the server for the whole run.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flags: Arc<ServerFlags>,
}

impl StopHandle {
    /// Ask the serve loop to exit. Takes effect within one poll interval.
    pub fn request_stop(&self) {
        debug!("stop requested");
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    /// Whether the serve loop is currently running and not yet asked to stop.
    pub fn is_started(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst) && !self.flags.stop.load(Ordering::SeqCst)
    }
}

/// Everything the serve loop needs, movable into a serving thread.
struct ServerCore {
    channel: String,
    request: ReadOnlySegment<BinaryFutex>,
    response: ReadWriteSegment<BinaryFutex>,
    callback: TriggerCallback,
    error_hook: Option<ErrorHook>,
    poll_interval: Duration,
    flags: Arc<ServerFlags>,
    served: u64,
}

impl ServerCore {
    /// Run the serve loop until a stop is requested, then return the core
    /// so the owning server can poll, restart or transfer it afterwards.
    fn run(mut self) -> Self {
        self.flags.running.store(true, Ordering::SeqCst);
        info!(channel = %self.channel, "trigger server started");

        loop {
            // Checked before the wait: a consumed request is always served
            // and answered before this loop exits.
            if self.flags.stop.load(Ordering::SeqCst) {
                break;
            }
            match self.request.get().wait_timeout(self.poll_interval) {
                WaitStatus::Signaled => self.serve_one(),
                WaitStatus::TimedOut => {}
            }
        }

        self.flags.running.store(false, Ordering::SeqCst);
        info!(channel = %self.channel, served = self.served, "trigger server stopped");
        self
    }

    /// Serve a request that has already been consumed from the futex.
    fn serve_one(&mut self) {
        if let Err(e) = (self.callback)() {
            warn!(channel = %self.channel, error = %e, "trigger callback failed");
            if let Some(hook) = &self.error_hook {
                hook(e.as_ref());
            }
        }
        // Posted unconditionally: the client is waiting on completion, not
        // on success, and must never be left blocked by a callback error.
        self.response.get().post();
        self.served += 1;
        debug!(channel = %self.channel, served = self.served, "request served");
    }
}

/// Server end of a trigger channel.
pub struct RemoteTriggerServer {
    channel: String,
    flags: Arc<ServerFlags>,
    core: Option<ServerCore>,
    worker: Option<ThreadHandle<ServerCore>>,
    /// A serve loop ran at least once; distinguishes NotStarted from Stopped.
    entered: bool,
    thread_options: ThreadOptions,
}

impl RemoteTriggerServer {
    /// Create a server for `channel`, provisioning both futex segments if
    /// they do not exist yet.
    ///
    /// `callback` runs once per trigger, in whichever thread serves the
    /// loop. The provider must outlive the server: it owns the backing
    /// files of the channel's segments.
    pub fn create<F>(
        provider: &SegmentProvider,
        channel: &str,
        callback: F,
    ) -> TriggerResult<Self>
    where
        F: FnMut() -> Result<(), CallbackError> + Send + 'static,
    {
        channel::provision(provider, channel)?;

        let request = provider.open_read_only::<BinaryFutex>(&request_segment_name(channel))?;
        let response = provider.open_read_write::<BinaryFutex>(&response_segment_name(channel))?;

        let flags = Arc::new(ServerFlags::new());
        let core = ServerCore {
            channel: channel.to_string(),
            request,
            response,
            callback: Box::new(callback),
            error_hook: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            flags: Arc::clone(&flags),
            served: 0,
        };

        debug!(channel = %channel, "trigger server created");
        Ok(Self {
            channel: channel.to_string(),
            flags,
            core: Some(core),
            worker: None,
            entered: false,
            thread_options: ThreadOptions::default(),
        })
    }

    /// Override the bounded-wait slice of the serve loop.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        if let Some(core) = self.core.as_mut() {
            core.poll_interval = interval;
        }
        self
    }

    /// Options for the thread spawned by [`start_async`](Self::start_async).
    pub fn with_thread_options(mut self, options: ThreadOptions) -> Self {
        self.thread_options = options;
        self
    }

    /// Install a hook receiving every error the callback returns.
    ///
    /// Fails with [`TriggerError::NotReady`] once the core has been handed
    /// to a serving thread or transferred away.
    pub fn set_error_hook<H>(&mut self, hook: H) -> TriggerResult<()>
    where
        H: Fn(&(dyn std::error::Error + Send + Sync)) + Send + Sync + 'static,
    {
        let core = self.core.as_mut().ok_or(TriggerError::NotReady {
            reason: "error hook must be installed while no serve loop runs",
        })?;
        core.error_hook = Some(Box::new(hook));
        Ok(())
    }

    /// The channel this server serves.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Handle that can stop this server from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flags: Arc::clone(&self.flags),
        }
    }

    /// Refuse a start, or accept it as a no-op, while a previous run is
    /// still in the way. `Ok(true)` means the caller should return quietly.
    fn start_blocked(&self) -> TriggerResult<bool> {
        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                warn!(channel = %self.channel, "server already running, ignoring start");
                return Ok(true);
            }
            return Err(TriggerError::NotReady {
                reason: "previous serving thread not joined",
            });
        }
        Ok(false)
    }

    /// Run the serve loop in the calling thread.
    ///
    /// Blocks until a [`StopHandle`] requests a stop. Calling this while a
    /// serve loop is already running is a logged no-op; calling it after an
    /// asynchronous run that was never joined fails with
    /// [`TriggerError::NotReady`], as does calling it on a hollow handle.
    pub fn start(&mut self) -> TriggerResult<()> {
        if self.start_blocked()? {
            return Ok(());
        }
        let core = self.core.take().ok_or(TriggerError::NotReady {
            reason: "server core transferred away",
        })?;
        // A stop left over from the previous run must not end this one.
        self.flags.stop.store(false, Ordering::SeqCst);
        self.entered = true;
        self.core = Some(core.run());
        Ok(())
    }

    /// Run the serve loop in a spawned thread and return immediately.
    ///
    /// The thread uses the configured [`ThreadOptions`]. The no-op and
    /// [`TriggerError::NotReady`] rules of [`start`](Self::start) apply. If
    /// the spawn itself fails the serving state is lost and the handle is
    /// left hollow.
    pub fn start_async(&mut self) -> TriggerResult<()> {
        if self.start_blocked()? {
            return Ok(());
        }
        let core = self.core.take().ok_or(TriggerError::NotReady {
            reason: "server core transferred away",
        })?;
        self.flags.stop.store(false, Ordering::SeqCst);
        let worker = crate::thread::spawn(self.thread_options.clone(), move || core.run())?;
        self.entered = true;
        self.worker = Some(worker);
        Ok(())
    }

    /// Ask the serve loop to exit. Takes effect within one poll interval.
    pub fn request_stop(&self) {
        self.stop_handle().request_stop();
    }

    /// Whether the serve loop is currently running and not yet asked to stop.
    pub fn is_started(&self) -> bool {
        self.stop_handle().is_started()
    }

    /// Whether [`start`](Self::start) or [`start_async`](Self::start_async)
    /// would enter the serve loop right now.
    pub fn is_ready_to_start(&self) -> bool {
        self.core.is_some() && self.worker.is_none()
    }

    /// Serve a single pending request without blocking.
    ///
    /// Checks the request futex once: if a request is pending it is
    /// consumed, the callback runs and the response is posted, returning
    /// `true`. Returns `false` immediately when nothing is pending, while a
    /// serve loop is running (the loop owns the futex then), or on a hollow
    /// handle. One posted request yields exactly one `true`, no matter how
    /// often this is called afterwards.
    pub fn query(&mut self) -> bool {
        if self.is_started() {
            return false;
        }
        let Some(core) = self.core.as_mut() else {
            return false;
        };
        if !core.request.get().try_wait() {
            return false;
        }
        core.serve_one();
        true
    }

    /// Wait for the asynchronous serving thread to exit and reclaim the
    /// serving state.
    ///
    /// Callers normally [`request_stop`](Self::request_stop) first; joining
    /// a loop that was never asked to stop blocks until someone else stops
    /// it. A no-op when no serving thread was spawned or it was already
    /// joined.
    pub fn join_async_thread(&mut self) -> TriggerResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.core = Some(worker.join()?);
        Ok(())
    }

    /// Current lifecycle state, derived from the shared flags.
    pub fn state(&self) -> ServerState {
        if self.flags.running.load(Ordering::SeqCst) {
            if self.flags.stop.load(Ordering::SeqCst) {
                return ServerState::StopRequested;
            }
            if self.worker.is_some() {
                return ServerState::RunningAsync;
            }
            return ServerState::RunningSync;
        }
        if self.entered {
            ServerState::Stopped
        } else {
            ServerState::NotStarted
        }
    }

    /// Transfer the serving state to a new server object.
    ///
    /// A running serving thread is stopped and joined first. The
    /// destination begins a fresh lifecycle ([`ServerState::NotStarted`],
    /// its own flags) and must be started explicitly. The source is left
    /// hollow: every later operation on it fails with
    /// [`TriggerError::NotReady`], and stop handles taken from it no longer
    /// reach the serving loop.
    pub fn take(&mut self) -> TriggerResult<Self> {
        if self.worker.is_some() {
            self.request_stop();
            self.join_async_thread()?;
        }
        let mut core = self.core.take().ok_or(TriggerError::NotReady {
            reason: "server core already transferred",
        })?;

        let flags = Arc::new(ServerFlags::new());
        core.flags = Arc::clone(&flags);
        self.entered = false;

        debug!(channel = %self.channel, "server core transferred");
        Ok(Self {
            channel: self.channel.clone(),
            flags,
            core: Some(core),
            worker: None,
            entered: false,
            thread_options: self.thread_options.clone(),
        })
    }
}

impl Drop for RemoteTriggerServer {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for RemoteTriggerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTriggerServer")
            .field("channel", &self.channel)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    fn test_provider() -> SegmentProvider {
        SegmentProvider::new("axonsrv").unwrap()
    }

    fn unique_channel(name: &str) -> String {
        format!("{}_{}", name, std::process::id())
    }

    /// Client-side handles for poking a server under test.
    struct TestClient {
        request: ReadWriteSegment<BinaryFutex>,
        response: ReadOnlySegment<BinaryFutex>,
    }

    impl TestClient {
        fn attach(provider: &SegmentProvider, channel: &str) -> Self {
            Self {
                request: provider
                    .open_read_write::<BinaryFutex>(&request_segment_name(channel))
                    .unwrap(),
                response: provider
                    .open_read_only::<BinaryFutex>(&response_segment_name(channel))
                    .unwrap(),
            }
        }

        fn fire(&self, timeout: Duration) -> WaitStatus {
            self.request.get().post();
            self.response.get().wait_timeout(timeout)
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn async_server_answers_triggers() {
        let provider = test_provider();
        let channel = unique_channel("srv_async");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let mut server = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        server.start_async().unwrap();
        let client = TestClient::attach(&provider, &channel);

        for _ in 0..3 {
            assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        server.request_stop();
        server.join_async_thread().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn sync_server_runs_until_stop_handle_fires() {
        let provider = test_provider();
        let channel = unique_channel("srv_sync");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let server = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap()
        .with_poll_interval(Duration::from_millis(20));

        let stop = server.stop_handle();
        let runner = std::thread::spawn(move || {
            let mut server = server;
            server.start().unwrap();
            server
        });

        let client = TestClient::attach(&provider, &channel);
        assert!(wait_until(|| stop.is_started(), Duration::from_secs(2)));
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        stop.request_stop();
        let server = runner.join().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(!server.is_started());
    }

    #[test]
    fn stop_without_requests_exits_within_poll_interval() {
        let provider = test_provider();
        let channel = unique_channel("srv_idle");

        let mut server = RemoteTriggerServer::create(&provider, &channel, || Ok(()))
            .unwrap()
            .with_poll_interval(Duration::from_millis(50));
        server.start_async().unwrap();
        assert!(wait_until(|| server.is_started(), Duration::from_secs(2)));

        let start = Instant::now();
        server.request_stop();
        server.join_async_thread().unwrap();

        // No trigger ever arrived; the bounded wait must still notice the
        // stop within roughly one poll slice.
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn start_while_running_is_a_noop() {
        let provider = test_provider();
        let channel = unique_channel("srv_double");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let mut server = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert!(server.is_ready_to_start());

        server.start_async().unwrap();
        assert!(!server.is_ready_to_start());

        // Both starts must be accepted but inert while the loop runs.
        server.start_async().unwrap();
        server.start().unwrap();

        let client = TestClient::attach(&provider, &channel);
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        // One loop, one callback per trigger.
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        server.request_stop();
        server.join_async_thread().unwrap();
    }

    #[test]
    fn restart_before_join_is_not_ready() {
        let provider = test_provider();
        let channel = unique_channel("srv_rejoin");

        let mut server = RemoteTriggerServer::create(&provider, &channel, || Ok(()))
            .unwrap()
            .with_poll_interval(Duration::from_millis(20));

        server.start_async().unwrap();
        assert!(wait_until(|| server.is_started(), Duration::from_secs(2)));
        server.request_stop();
        assert!(wait_until(
            || server.state() == ServerState::Stopped,
            Duration::from_secs(2)
        ));

        // Loop exited but the thread is still unjoined.
        assert!(!server.is_ready_to_start());
        assert!(matches!(
            server.start_async(),
            Err(TriggerError::NotReady { .. })
        ));
        assert!(matches!(server.start(), Err(TriggerError::NotReady { .. })));

        server.join_async_thread().unwrap();
        assert!(server.is_ready_to_start());
    }

    #[test]
    fn stopped_server_can_serve_again() {
        let provider = test_provider();
        let channel = unique_channel("srv_restart");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let mut server = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        let client = TestClient::attach(&provider, &channel);

        // First run.
        server.start_async().unwrap();
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        server.request_stop();
        server.join_async_thread().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);

        // Second run of the same server; the old stop request must not
        // leak into it.
        server.start_async().unwrap();
        assert!(wait_until(|| server.is_started(), Duration::from_secs(2)));
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        server.request_stop();
        server.join_async_thread().unwrap();
    }

    #[test]
    fn lifecycle_states_are_observable() {
        let provider = test_provider();
        let channel = unique_channel("srv_states");

        let mut server = RemoteTriggerServer::create(&provider, &channel, || Ok(())).unwrap();
        assert_eq!(server.state(), ServerState::NotStarted);

        server.start_async().unwrap();
        assert!(wait_until(|| server.is_started(), Duration::from_secs(2)));
        assert_eq!(server.state(), ServerState::RunningAsync);

        server.request_stop();
        server.join_async_thread().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn query_serves_one_request_per_post() {
        let provider = test_provider();
        let channel = unique_channel("srv_query");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let mut server = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        let client = TestClient::attach(&provider, &channel);

        // Idle: nothing pending.
        assert!(!server.query());
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // One post, one serve, response observable. Repeats stay false.
        client.request.get().post();
        assert!(server.query());
        assert!(!server.query());
        assert!(!server.query());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(client.response.get().try_wait());

        // Coalescing carries over: two posts without a wait are one request.
        client.request.get().post();
        client.request.get().post();
        assert!(server.query());
        assert!(!server.query());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn query_never_blocks() {
        let provider = test_provider();
        let channel = unique_channel("srv_querytime");

        let mut server = RemoteTriggerServer::create(&provider, &channel, || Ok(())).unwrap();

        let start = Instant::now();
        for _ in 0..100 {
            assert!(!server.query());
        }
        // 100 empty polls are single atomic checks; nowhere near a wait.
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn query_defers_to_a_running_loop() {
        let provider = test_provider();
        let channel = unique_channel("srv_queryrun");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let mut server = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        server.start_async().unwrap();
        assert!(wait_until(|| server.is_started(), Duration::from_secs(2)));
        assert!(!server.query());

        // The loop, not query, serves the request.
        let client = TestClient::attach(&provider, &channel);
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        server.request_stop();
        server.join_async_thread().unwrap();
    }

    #[test]
    fn take_hands_over_the_serving_state() {
        let provider = test_provider();
        let channel = unique_channel("srv_take");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let mut source = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        let mut target = source.take().unwrap();
        assert!(target.is_ready_to_start());
        assert_eq!(target.state(), ServerState::NotStarted);

        // The hollow source can no longer start, poll or transfer.
        assert!(matches!(
            source.start(),
            Err(TriggerError::NotReady { .. })
        ));
        assert!(matches!(source.take(), Err(TriggerError::NotReady { .. })));
        assert!(!source.query());

        target.start_async().unwrap();
        let client = TestClient::attach(&provider, &channel);
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        target.request_stop();
        target.join_async_thread().unwrap();
    }

    #[test]
    fn take_stops_a_running_server_first() {
        let provider = test_provider();
        let channel = unique_channel("srv_take_live");
        let counter = Arc::new(AtomicU32::new(0));

        let cb_counter = Arc::clone(&counter);
        let mut source = RemoteTriggerServer::create(&provider, &channel, move || {
            cb_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        source.start_async().unwrap();
        assert!(wait_until(|| source.is_started(), Duration::from_secs(2)));

        let mut target = source.take().unwrap();
        assert!(!source.is_started());

        // The transferred state begins a fresh lifecycle and serves only
        // after an explicit start.
        assert_eq!(target.state(), ServerState::NotStarted);
        assert!(target.is_ready_to_start());

        target.start_async().unwrap();
        let client = TestClient::attach(&provider, &channel);
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        target.request_stop();
        target.join_async_thread().unwrap();
    }

    #[test]
    fn callback_error_reaches_hook_and_client_still_released() {
        let provider = test_provider();
        let channel = unique_channel("srv_hook");
        let hook_hits = Arc::new(AtomicU32::new(0));

        let mut server = RemoteTriggerServer::create(&provider, &channel, || {
            Err("deliberate failure".into())
        })
        .unwrap();

        let hook_counter = Arc::clone(&hook_hits);
        server
            .set_error_hook(move |_| {
                hook_counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        server.start_async().unwrap();
        let client = TestClient::attach(&provider, &channel);

        // The client must be released even though the callback failed.
        assert_eq!(client.fire(Duration::from_secs(2)), WaitStatus::Signaled);
        assert!(wait_until(
            || hook_hits.load(Ordering::SeqCst) == 1,
            Duration::from_secs(1)
        ));

        server.request_stop();
        server.join_async_thread().unwrap();
    }

    #[test]
    fn join_without_async_thread_is_a_noop() {
        let provider = test_provider();
        let channel = unique_channel("srv_nojoin");

        let mut server = RemoteTriggerServer::create(&provider, &channel, || Ok(())).unwrap();
        server.join_async_thread().unwrap();
        // Still fully usable afterwards.
        assert!(server.is_ready_to_start());
    }
}
