//! Namespace-scoped segment factory.
//!
//! A [`SegmentProvider`] owns the naming and lifetime of segments under one
//! namespace: `/dev/shm/<namespace>_<segment>` plus a `.meta` JSON sidecar
//! for discovery. Segments created through a provider are unlinked when the
//! provider drops; handles opened from them stay valid until unmapped (the
//! kernel keeps the pages alive), but no new attach can find them.
//!
//! Servers and clients never own segment lifetime themselves — they borrow
//! a provider to attach, and the provider must outlive them.

use crate::discovery::SegmentInfo;
use crate::error::{ShmError, ShmResult};
use crate::platform::{attach_segment_mmap, create_segment_mmap, current_pid};
use crate::segment::{
    ReadOnlySegment, ReadWriteSegment, SEGMENT_HEADER_SIZE, SegmentHeader, Shareable,
};
use memmap2::MmapMut;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::atomic::{Ordering, fence};
use std::time::SystemTime;
use tracing::debug;

/// Namespace used by the runtime when none is configured.
pub const DEFAULT_NAMESPACE: &str = "axon";

/// Longest accepted segment or namespace name. Keeps the full path plus the
/// `.meta` sidecar suffix well inside the 255-byte /dev/shm filename limit.
pub const MAX_NAME_LEN: usize = 96;

/// Validate a segment or namespace name.
pub fn validate_name(name: &str) -> ShmResult<()> {
    if name.is_empty() {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
            reason: "must not be empty",
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
            reason: "longer than 96 bytes",
        });
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
            reason: "only ASCII alphanumerics, '_' and '-' allowed",
        });
    }
    Ok(())
}

/// Factory for named, typed segments under one namespace.
pub struct SegmentProvider {
    namespace: String,
    /// Segment names created by this provider, unlinked on drop.
    created: Mutex<Vec<String>>,
}

impl SegmentProvider {
    /// New provider for `namespace`.
    pub fn new(namespace: &str) -> ShmResult<Self> {
        validate_name(namespace)?;
        Ok(Self {
            namespace: namespace.to_string(),
            created: Mutex::new(Vec::new()),
        })
    }

    /// The namespace this provider manages.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Backing-file path for a segment name.
    pub fn segment_path(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("/dev/shm/{}_{}", self.namespace, name))
    }

    fn metadata_path(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("/dev/shm/{}_{}.meta", self.namespace, name))
    }

    /// Create a segment carrying a zero-initialized `T` payload.
    ///
    /// Exclusive: fails with [`ShmError::AlreadyExists`] if the segment is
    /// present. The header is written and release-fenced before the function
    /// returns, so a concurrent attach never observes a half-written header.
    pub fn create<T: Shareable>(&self, name: &str) -> ShmResult<()> {
        const {
            assert!(std::mem::align_of::<T>() <= SEGMENT_HEADER_SIZE);
            assert!(std::mem::size_of::<T>() > 0);
        }
        validate_name(name)?;

        let path = self.segment_path(name);
        let total_size = SEGMENT_HEADER_SIZE + std::mem::size_of::<T>();

        let mut mmap = match create_segment_mmap(&path, total_size) {
            Ok(mmap) => mmap,
            Err(ShmError::Io { source }) if source.kind() == ErrorKind::AlreadyExists => {
                return Err(ShmError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            Err(other) => return Err(other),
        };

        // Payload bytes stay zero-filled, which Shareable guarantees is a
        // valid T. Publish the header last.
        unsafe {
            (mmap.as_mut_ptr() as *mut SegmentHeader).write(SegmentHeader::new::<T>(current_pid()));
        }
        fence(Ordering::Release);

        self.write_metadata::<T>(name)?;
        self.created.lock().push(name.to_string());

        debug!(segment = %name, namespace = %self.namespace, size = total_size, "created segment");
        Ok(())
    }

    /// Create the segment if absent; validate it if already present.
    pub fn ensure<T: Shareable>(&self, name: &str) -> ShmResult<()> {
        match self.create::<T>(name) {
            Err(ShmError::AlreadyExists { .. }) => {
                // Somebody provisioned it first; accept it only if it carries
                // the payload type we expect.
                self.attach::<T>(name).map(|_| ())
            }
            other => other,
        }
    }

    /// Attach with a wait-side (shared access only) handle.
    pub fn open_read_only<T: Shareable>(&self, name: &str) -> ShmResult<ReadOnlySegment<T>> {
        let mmap = self.attach::<T>(name)?;
        Ok(ReadOnlySegment::from_mapping(name.to_string(), mmap))
    }

    /// Attach with a post-side (writing end) handle.
    pub fn open_read_write<T: Shareable>(&self, name: &str) -> ShmResult<ReadWriteSegment<T>> {
        let mmap = self.attach::<T>(name)?;
        Ok(ReadWriteSegment::from_mapping(name.to_string(), mmap))
    }

    /// Unlink a segment and its sidecar. Missing files are not an error.
    pub fn remove(&self, name: &str) -> ShmResult<()> {
        validate_name(name)?;
        let _ = std::fs::remove_file(self.segment_path(name));
        let _ = std::fs::remove_file(self.metadata_path(name));
        self.created.lock().retain(|n| n != name);
        debug!(segment = %name, namespace = %self.namespace, "removed segment");
        Ok(())
    }

    /// Whether a segment's backing file currently exists.
    pub fn exists(&self, name: &str) -> bool {
        self.segment_path(name).exists()
    }

    fn attach<T: Shareable>(&self, name: &str) -> ShmResult<MmapMut> {
        const {
            assert!(std::mem::align_of::<T>() <= SEGMENT_HEADER_SIZE);
        }
        validate_name(name)?;

        let path = self.segment_path(name);
        let mmap = match attach_segment_mmap(&path) {
            Ok(mmap) => mmap,
            Err(ShmError::Io { source }) if source.kind() == ErrorKind::NotFound => {
                return Err(ShmError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(ShmError::Io { source }) if source.kind() == ErrorKind::PermissionDenied => {
                return Err(ShmError::PermissionDenied {
                    name: name.to_string(),
                });
            }
            Err(other) => return Err(other),
        };

        let needed = SEGMENT_HEADER_SIZE + std::mem::size_of::<T>();
        if mmap.len() < needed {
            return Err(ShmError::CorruptSegment {
                name: name.to_string(),
                reason: format!("mapped {} bytes, need at least {}", mmap.len(), needed),
            });
        }

        let header = unsafe { &*(mmap.as_ptr() as *const SegmentHeader) };
        header.validate::<T>(name)?;

        Ok(mmap)
    }

    fn write_metadata<T: Shareable>(&self, name: &str) -> ShmResult<()> {
        let info = SegmentInfo {
            name: name.to_string(),
            size: std::mem::size_of::<T>(),
            type_hash: crate::segment::type_hash::<T>(),
            creator_pid: current_pid(),
            created_at: SystemTime::now(),
        };

        let json = serde_json::to_string_pretty(&info)?;

        // Truncate instead of create_new: a stale sidecar left by a crashed
        // creator must not block re-provisioning.
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(self.metadata_path(name))?;
        std::io::Write::write_all(&mut file, json.as_bytes())?;

        Ok(())
    }
}

impl Drop for SegmentProvider {
    fn drop(&mut self) {
        for name in self.created.get_mut().drain(..) {
            let _ = std::fs::remove_file(format!("/dev/shm/{}_{}", self.namespace, name));
            let _ = std::fs::remove_file(format!("/dev/shm/{}_{}.meta", self.namespace, name));
        }
    }
}

impl std::fmt::Debug for SegmentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentProvider")
            .field("namespace", &self.namespace)
            .field("created", &self.created.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futex::BinaryFutex;
    use proptest::prelude::*;

    fn test_provider() -> SegmentProvider {
        SegmentProvider::new("axontest").unwrap()
    }

    fn unique(name: &str) -> String {
        format!("{}_{}", name, std::process::id())
    }

    #[test]
    fn create_then_open_roundtrip() {
        let provider = test_provider();
        let name = unique("prov_roundtrip");

        provider.create::<BinaryFutex>(&name).unwrap();
        assert!(provider.exists(&name));

        let read_only = provider.open_read_only::<BinaryFutex>(&name).unwrap();
        let read_write = provider.open_read_write::<BinaryFutex>(&name).unwrap();

        // Same underlying word through both handles.
        assert!(read_write.get().post());
        assert!(read_only.get().try_wait());
    }

    #[test]
    fn double_create_is_already_exists() {
        let provider = test_provider();
        let name = unique("prov_double");

        provider.create::<BinaryFutex>(&name).unwrap();
        assert!(matches!(
            provider.create::<BinaryFutex>(&name),
            Err(ShmError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn ensure_is_idempotent() {
        let provider = test_provider();
        let name = unique("prov_ensure");

        provider.ensure::<BinaryFutex>(&name).unwrap();
        provider.ensure::<BinaryFutex>(&name).unwrap();
        assert!(provider.exists(&name));
    }

    #[test]
    fn open_missing_is_not_found() {
        let provider = test_provider();
        let name = unique("prov_missing");

        assert!(matches!(
            provider.open_read_only::<BinaryFutex>(&name),
            Err(ShmError::NotFound { .. })
        ));
    }

    #[test]
    fn open_with_wrong_type_is_mismatch() {
        #[repr(C)]
        struct Pair {
            _a: u64,
            _b: u64,
        }
        // SAFETY: repr(C), plain integers, zero-valid.
        unsafe impl Shareable for Pair {}

        let provider = test_provider();
        let name = unique("prov_mismatch");

        provider.create::<BinaryFutex>(&name).unwrap();
        assert!(matches!(
            provider.open_read_only::<Pair>(&name),
            Err(ShmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn drop_unlinks_created_segments() {
        let name = unique("prov_droptest");
        let path;
        {
            let provider = test_provider();
            provider.create::<BinaryFutex>(&name).unwrap();
            path = provider.segment_path(&name);
            assert!(path.exists());
        }
        assert!(!path.exists(), "provider drop must unlink its segments");
    }

    #[test]
    fn remove_clears_backing_files() {
        let provider = test_provider();
        let name = unique("prov_remove");

        provider.create::<BinaryFutex>(&name).unwrap();
        provider.remove(&name).unwrap();
        assert!(!provider.exists(&name));

        // Removing again is fine.
        provider.remove(&name).unwrap();
    }

    #[test]
    fn rejects_bad_names() {
        assert!(matches!(
            validate_name(""),
            Err(ShmError::InvalidName { .. })
        ));
        assert!(matches!(
            validate_name("has/slash"),
            Err(ShmError::InvalidName { .. })
        ));
        assert!(matches!(
            validate_name("has space"),
            Err(ShmError::InvalidName { .. })
        ));
        assert!(matches!(
            validate_name(&"x".repeat(MAX_NAME_LEN + 1)),
            Err(ShmError::InvalidName { .. })
        ));
        assert!(validate_name("ok_name-42").is_ok());
    }

    proptest! {
        /// Accepted names survive the full path derivation without escaping
        /// the namespace directory scheme.
        #[test]
        fn valid_names_stay_flat(name in "[A-Za-z0-9_-]{1,96}") {
            prop_assert!(validate_name(&name).is_ok());
            let provider = test_provider();
            let path = provider.segment_path(&name);
            prop_assert_eq!(path.parent().unwrap().to_str().unwrap(), "/dev/shm");
        }

        /// Anything with a path separator or control byte is rejected.
        #[test]
        fn separators_rejected(name in "[A-Za-z0-9]{0,4}/[A-Za-z0-9]{0,4}") {
            prop_assert!(validate_name(&name).is_err());
        }
    }
}
