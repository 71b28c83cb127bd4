//! Channel naming and provisioning.
//!
//! A trigger channel is a pair of futex segments sharing one base name:
//! `<channel>_request` (client posts, server waits) and
//! `<channel>_response` (server posts, client waits). Both sides derive
//! segment names from the channel name alone, so agreeing on a channel
//! string is the whole rendezvous protocol.

use crate::error::{TriggerError, TriggerResult};
use axon_shm::{BinaryFutex, MAX_NAME_LEN, SegmentProvider, ShmError};

/// Channel used by the CLI tools when none is configured.
pub const DEFAULT_CHANNEL: &str = "motion_sync";

/// Suffix of the client-to-server segment.
pub const REQUEST_SUFFIX: &str = "_request";
/// Suffix of the server-to-client segment.
pub const RESPONSE_SUFFIX: &str = "_response";

/// Segment name the client posts and the server waits on.
pub fn request_segment_name(channel: &str) -> String {
    format!("{channel}{REQUEST_SUFFIX}")
}

/// Segment name the server posts and the client waits on.
pub fn response_segment_name(channel: &str) -> String {
    format!("{channel}{RESPONSE_SUFFIX}")
}

/// Validate a channel name, leaving headroom for the segment suffixes.
pub fn validate_channel(channel: &str) -> TriggerResult<()> {
    axon_shm::validate_name(channel).map_err(TriggerError::from)?;
    if channel.len() + RESPONSE_SUFFIX.len() > MAX_NAME_LEN {
        return Err(TriggerError::Shm {
            source: ShmError::InvalidName {
                name: channel.to_string(),
                reason: "too long once the channel suffixes are appended",
            },
        });
    }
    Ok(())
}

/// Create both futex segments of a channel if they do not exist yet.
///
/// Idempotent: existing segments are validated rather than recreated, so
/// either end of the channel can provision first.
pub fn provision(provider: &SegmentProvider, channel: &str) -> TriggerResult<()> {
    validate_channel(channel)?;
    provider.ensure::<BinaryFutex>(&request_segment_name(channel))?;
    provider.ensure::<BinaryFutex>(&response_segment_name(channel))?;
    Ok(())
}
