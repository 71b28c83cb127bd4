//! Remote trigger client.
//!
//! The client end of a trigger channel: posts the request futex and waits
//! for the response futex. One client maps to one server; the exclusive
//! borrow on [`RemoteTriggerClient::trigger`] makes overlapping triggers
//! through a single client unrepresentable.
//!
//! A response that arrives after the client gave up waiting is not
//! discarded: the token stays posted and the next wait on the channel
//! consumes it. Coalescing guarantees a burst of late responses collapses
//! into a single token, so a late answer is observed at most once.

use crate::channel::{request_segment_name, response_segment_name, validate_channel};
use crate::error::{TriggerError, TriggerResult};
use axon_shm::{BinaryFutex, ReadOnlySegment, ReadWriteSegment, SegmentProvider, WaitStatus};
use std::time::Duration;
use tracing::debug;

/// Client end of a trigger channel.
pub struct RemoteTriggerClient {
    channel: String,
    request: ReadWriteSegment<BinaryFutex>,
    response: ReadOnlySegment<BinaryFutex>,
}

impl RemoteTriggerClient {
    /// Attach to an existing channel.
    ///
    /// Fails with [`ShmError::NotFound`](axon_shm::ShmError::NotFound) if
    /// the channel was never provisioned; the server side (or
    /// [`channel::provision`](crate::channel::provision)) creates the
    /// segments.
    pub fn attach(provider: &SegmentProvider, channel: &str) -> TriggerResult<Self> {
        validate_channel(channel)?;
        let request = provider.open_read_write::<BinaryFutex>(&request_segment_name(channel))?;
        let response = provider.open_read_only::<BinaryFutex>(&response_segment_name(channel))?;

        debug!(channel = %channel, "trigger client attached");
        Ok(Self {
            channel: channel.to_string(),
            request,
            response,
        })
    }

    /// The channel this client fires on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Fire a trigger and wait for the server's response.
    ///
    /// With `timeout: None` this blocks until the response arrives. With a
    /// timeout it fails with [`TriggerError::Timeout`] once the deadline
    /// passes; the request stays posted and the server will still serve it.
    pub fn trigger(&mut self, timeout: Option<Duration>) -> TriggerResult<()> {
        self.request.get().post();
        match timeout {
            None => {
                self.response.get().wait();
                Ok(())
            }
            Some(timeout) => match self.response.get().wait_timeout(timeout) {
                WaitStatus::Signaled => Ok(()),
                WaitStatus::TimedOut => Err(TriggerError::Timeout { timeout }),
            },
        }
    }

    /// Fire a trigger without waiting, deferring the wait to the returned
    /// [`PendingTrigger`].
    ///
    /// The pending trigger borrows the client mutably, so no second trigger
    /// can be fired until it is waited on or dropped. Dropping it without
    /// waiting leaves the eventual response token posted for the next wait
    /// on this channel.
    pub fn trigger_async(&mut self) -> PendingTrigger<'_> {
        self.request.get().post();
        PendingTrigger {
            client: self,
            completed: false,
        }
    }
}

impl std::fmt::Debug for RemoteTriggerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTriggerClient")
            .field("channel", &self.channel)
            .finish()
    }
}

/// An in-flight trigger whose response has not been claimed yet.
#[derive(Debug)]
pub struct PendingTrigger<'a> {
    client: &'a mut RemoteTriggerClient,
    completed: bool,
}

impl PendingTrigger<'_> {
    /// Poll for the response without blocking.
    ///
    /// Once this returns `true` the response is claimed and every later
    /// call returns `true` as well.
    pub fn ready(&mut self) -> bool {
        if !self.completed && self.client.response.get().try_wait() {
            self.completed = true;
        }
        self.completed
    }

    /// Block until the response arrives or the deadline passes.
    pub fn wait(mut self, timeout: Option<Duration>) -> TriggerResult<()> {
        if self.ready() {
            return Ok(());
        }
        match timeout {
            None => {
                self.client.response.get().wait();
                Ok(())
            }
            Some(timeout) => match self.client.response.get().wait_timeout(timeout) {
                WaitStatus::Signaled => Ok(()),
                WaitStatus::TimedOut => Err(TriggerError::Timeout { timeout }),
            },
        }
    }
}
