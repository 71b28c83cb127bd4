//! Segment discovery and orphan cleanup.
//!
//! Discovery works from the filesystem alone: every segment created through
//! a [`SegmentProvider`](crate::provider::SegmentProvider) leaves a `.meta`
//! JSON sidecar next to its backing file, and this module scans `/dev/shm`
//! for both. A segment whose creator died without unlinking its files is an
//! orphan and can be reclaimed with [`SegmentDiscovery::cleanup_orphaned`].

use crate::error::{ShmError, ShmResult};
use crate::platform::is_process_alive;
use crate::segment::SEGMENT_HEADER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Creator must be dead for this long before a segment counts as orphaned.
/// Guards against reaping a segment whose creator is mid-restart.
const ORPHAN_GRACE_SECS: u64 = 60;

/// Metadata recorded for every segment, persisted as a JSON sidecar.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SegmentInfo {
    /// Segment name without the namespace prefix.
    pub name: String,
    /// Payload size in bytes, excluding the header.
    pub size: usize,
    /// Layout hash of the payload type.
    pub type_hash: u32,
    /// PID of the creating process.
    pub creator_pid: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Filesystem scanner for the segments of one namespace.
#[derive(Debug, Clone)]
pub struct SegmentDiscovery {
    prefix: String,
}

impl SegmentDiscovery {
    /// Discovery scoped to `namespace`.
    pub fn new(namespace: &str) -> Self {
        Self {
            prefix: format!("{namespace}_"),
        }
    }

    /// List all segments in the namespace, newest first.
    pub fn list_segments(&self) -> ShmResult<Vec<SegmentInfo>> {
        let mut segments = Vec::new();

        let shm_dir = Path::new("/dev/shm");
        if !shm_dir.exists() {
            return Ok(segments);
        }

        for entry in std::fs::read_dir(shm_dir)?.flatten() {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(name) = file_name.strip_prefix(&self.prefix) else {
                continue;
            };
            if name.ends_with(".meta") {
                continue;
            }
            match self.load_info(name) {
                Ok(info) => segments.push(info),
                Err(e) => debug!(segment = %name, error = %e, "skipping unreadable segment"),
            }
        }

        segments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(segments)
    }

    /// Look a single segment up by name.
    pub fn find_segment(&self, name: &str) -> ShmResult<Option<SegmentInfo>> {
        if !Path::new(&format!("/dev/shm/{}{}", self.prefix, name)).exists() {
            return Ok(None);
        }
        self.load_info(name).map(Some)
    }

    /// Unlink every orphaned segment in the namespace. Returns how many were
    /// reclaimed.
    pub fn cleanup_orphaned(&self) -> ShmResult<usize> {
        let mut cleaned = 0;

        for info in self.list_segments()? {
            if !Self::is_orphaned(&info) {
                continue;
            }
            warn!(
                segment = %info.name,
                creator_pid = info.creator_pid,
                "reclaiming orphaned segment"
            );
            let _ = std::fs::remove_file(format!("/dev/shm/{}{}", self.prefix, info.name));
            let _ = std::fs::remove_file(format!("/dev/shm/{}{}.meta", self.prefix, info.name));
            cleaned += 1;
        }

        Ok(cleaned)
    }

    /// Aggregate counts over the namespace.
    pub fn stats(&self) -> DiscoveryStats {
        let segments = self.list_segments().unwrap_or_default();
        let total_segments = segments.len();
        let active_creators = segments
            .iter()
            .filter(|s| s.creator_pid != 0 && is_process_alive(s.creator_pid))
            .count();

        DiscoveryStats {
            total_segments,
            active_creators,
            orphaned_segments: segments.iter().filter(|s| Self::is_orphaned(s)).count(),
        }
    }

    /// Read a segment's sidecar, falling back to file metadata when the
    /// sidecar is missing or unparseable.
    fn load_info(&self, name: &str) -> ShmResult<SegmentInfo> {
        let meta_path = format!("/dev/shm/{}{}.meta", self.prefix, name);
        if let Ok(contents) = std::fs::read_to_string(&meta_path)
            && let Ok(info) = serde_json::from_str::<SegmentInfo>(&contents)
        {
            return Ok(info);
        }

        let segment_path = format!("/dev/shm/{}{}", self.prefix, name);
        let file_meta = std::fs::metadata(&segment_path).map_err(|e| ShmError::Io { source: e })?;
        let created_at = file_meta
            .created()
            .or_else(|_| file_meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        Ok(SegmentInfo {
            name: name.to_string(),
            size: (file_meta.len() as usize).saturating_sub(SEGMENT_HEADER_SIZE),
            type_hash: 0,
            // Unknown creator; never treated as orphaned.
            creator_pid: 0,
            created_at,
        })
    }

    fn is_orphaned(info: &SegmentInfo) -> bool {
        if info.creator_pid == 0 || is_process_alive(info.creator_pid) {
            return false;
        }
        match info.created_at.elapsed() {
            Ok(elapsed) => elapsed.as_secs() > ORPHAN_GRACE_SECS,
            // Clock went backwards; age unknowable, treat as orphaned.
            Err(_) => true,
        }
    }
}

/// Aggregate discovery counts.
#[derive(Debug, Clone)]
pub struct DiscoveryStats {
    /// Segments found in the namespace.
    pub total_segments: usize,
    /// Segments whose creator process is still alive.
    pub active_creators: usize,
    /// Segments eligible for [`SegmentDiscovery::cleanup_orphaned`].
    pub orphaned_segments: usize,
}
