//! Binary futex: a two-state wake/wait primitive living in shared memory.
//!
//! The futex word holds `0` (unsignaled) or `1` (signaled). [`BinaryFutex::post`]
//! raises the word and wakes one waiter; while the word is already raised,
//! further posts coalesce into the single pending wake instead of queueing.
//! [`BinaryFutex::wait_timeout`] consumes the wake (1 → 0) before returning,
//! so one post releases exactly one waiter.
//!
//! The syscalls deliberately omit `FUTEX_PRIVATE_FLAG`: waiters and posters
//! live in different processes mapping the same segment.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::error;

use crate::segment::Shareable;

/// Futex word value: no wake pending.
const UNSIGNALED: u32 = 0;
/// Futex word value: one wake pending.
const SIGNALED: u32 = 1;

/// Outcome of a bounded futex wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// A post was observed and consumed.
    Signaled,
    /// The timeout elapsed with no post to consume.
    TimedOut,
}

/// Two-state (signaled/unsignaled) semaphore backed by one futex word.
///
/// Safe to place in shared memory: `#[repr(C)]`, a single atomic word, and
/// all-zero bytes are a valid (unsignaled) state. All operations take `&self`
/// because the word is shared with other processes; a unique reference to it
/// would be a fiction.
#[repr(C)]
pub struct BinaryFutex {
    word: AtomicU32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<BinaryFutex>(), 4);
static_assertions::const_assert_eq!(std::mem::align_of::<BinaryFutex>(), 4);

// SAFETY: repr(C), no pointers or padding, zeroed bytes == unsignaled.
unsafe impl Shareable for BinaryFutex {}

impl BinaryFutex {
    /// New futex in the unsignaled state.
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(UNSIGNALED),
        }
    }

    /// Raise the futex and wake one waiter.
    ///
    /// Returns `true` if this call transitioned the word from unsignaled to
    /// signaled. Returns `false` (and performs no syscall) if a wake was
    /// already pending: posts coalesce, they do not queue.
    pub fn post(&self) -> bool {
        if self
            .word
            .compare_exchange(UNSIGNALED, SIGNALED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Wake at most one waiter; the protocol is 1:1.
            let ret = sys_futex(&self.word, libc::FUTEX_WAKE, 1, std::ptr::null());
            if ret == -1 {
                // Only reachable with a torn-down mapping.
                error!(
                    errno = std::io::Error::last_os_error().raw_os_error(),
                    "futex wake failed"
                );
            }
            true
        } else {
            false
        }
    }

    /// Consume a pending wake without blocking.
    ///
    /// Returns `true` exactly once per post, `false` when nothing is pending.
    pub fn try_wait(&self) -> bool {
        self.word
            .compare_exchange(SIGNALED, UNSIGNALED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Block until a wake is posted, then consume it.
    ///
    /// Prefer [`wait_timeout`](Self::wait_timeout) anywhere a stop request
    /// must be observed; an indefinite wait can only be released by a post.
    pub fn wait(&self) -> WaitStatus {
        self.wait_inner(None)
    }

    /// Block until a wake is posted or `timeout` elapses.
    ///
    /// The wake is consumed on [`WaitStatus::Signaled`]. A post racing the
    /// deadline is never lost: the word is rechecked after the kernel reports
    /// a timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitStatus {
        self.wait_inner(Some(timeout))
    }

    fn wait_inner(&self, timeout: Option<Duration>) -> WaitStatus {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            if self.try_wait() {
                return WaitStatus::Signaled;
            }

            let ts_storage;
            let ts_ptr = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return WaitStatus::TimedOut;
                    }
                    let remaining = d - now;
                    ts_storage = libc::timespec {
                        tv_sec: remaining.as_secs() as libc::time_t,
                        tv_nsec: remaining.subsec_nanos() as libc::c_long,
                    };
                    &ts_storage as *const libc::timespec
                }
                None => std::ptr::null(),
            };

            let ret = sys_futex(&self.word, libc::FUTEX_WAIT, UNSIGNALED, ts_ptr);
            if ret == -1 {
                match std::io::Error::last_os_error().raw_os_error() {
                    Some(libc::ETIMEDOUT) => {
                        // A post can land between the kernel timeout and our
                        // return; do not report it as lost.
                        return if self.try_wait() {
                            WaitStatus::Signaled
                        } else {
                            WaitStatus::TimedOut
                        };
                    }
                    // EAGAIN: word was not UNSIGNALED at syscall entry.
                    // EINTR: signal delivery. Both: re-examine the word.
                    Some(libc::EAGAIN) | Some(libc::EINTR) => continue,
                    errno => {
                        // Not reachable on a valid, aligned mapping. Report
                        // as a timeout so a polling caller keeps running.
                        error!(?errno, "unexpected futex wait failure");
                        return WaitStatus::TimedOut;
                    }
                }
            }
            // Woken: loop back and race to consume the token.
        }
    }

    /// Raw word value, for diagnostics and tests.
    pub fn value(&self) -> u32 {
        self.word.load(Ordering::Acquire)
    }

    /// Whether a wake is currently pending.
    pub fn is_signaled(&self) -> bool {
        self.value() == SIGNALED
    }
}

impl Default for BinaryFutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BinaryFutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryFutex")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

fn sys_futex(
    word: &AtomicU32,
    op: libc::c_int,
    val: u32,
    timeout: *const libc::timespec,
) -> libc::c_long {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            op,
            val,
            timeout,
            std::ptr::null_mut::<u32>(),
            0u32,
        )
    }
}
