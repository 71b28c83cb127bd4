//! Segment layout: validated header plus one typed payload.
//!
//! Every segment file is `[SegmentHeader | payload]`. The header pins down
//! magic, payload size, and a layout hash of the payload type, so an opener
//! compiled against a different struct definition is rejected at attach time
//! instead of reading garbage. The payload starts at byte 64, which keeps it
//! cache-line aligned for any payload alignment up to 64.

use crate::error::{ShmError, ShmResult};
use memmap2::MmapMut;
use std::marker::PhantomData;

/// Magic bytes identifying an AXON segment file.
pub const SEGMENT_MAGIC: [u8; 8] = *b"AXONSEG\0";

/// Bytes reserved for the header at the start of every segment.
pub const SEGMENT_HEADER_SIZE: usize = std::mem::size_of::<SegmentHeader>();

/// Marker for types that may live inside a shared-memory segment.
///
/// # Safety
///
/// Implementors must guarantee:
/// - `#[repr(C)]` layout, identical in every process that maps the segment,
/// - no references, pointers, or heap-owning fields,
/// - all-zero bytes are a valid value (segments are created zero-filled),
/// - alignment of at most 64 (the payload offset).
pub unsafe trait Shareable: Sized {}

/// Deterministic layout hash for a payload type.
///
/// Mixes size and alignment; cheap, collision-tolerant, and identical across
/// builds of the same struct definition. Used by the header validation to
/// reject attaches with the wrong payload type.
pub const fn type_hash<T>() -> u32 {
    let size = std::mem::size_of::<T>() as u32;
    let align = std::mem::align_of::<T>() as u32;
    size.wrapping_mul(0x9E37_79B9) ^ align.wrapping_mul(0x517C_C1B7)
}

/// Segment header, exactly one cache line.
#[repr(C, align(64))]
pub struct SegmentHeader {
    /// Magic number for validation
    pub magic: [u8; 8],
    /// Layout hash of the payload type (see [`type_hash`])
    pub type_hash: u32,
    /// Payload size in bytes
    pub payload_size: u32,
    /// Creating process ID
    pub creator_pid: u32,
    /// Reserved, zero
    _reserved: [u8; 44],
}

static_assertions::const_assert_eq!(std::mem::size_of::<SegmentHeader>(), 64);

impl SegmentHeader {
    /// New header for a segment carrying a `T` payload.
    pub fn new<T: Shareable>(creator_pid: u32) -> Self {
        Self {
            magic: SEGMENT_MAGIC,
            type_hash: type_hash::<T>(),
            payload_size: std::mem::size_of::<T>() as u32,
            creator_pid,
            _reserved: [0; 44],
        }
    }

    /// Validate magic and payload type against the opener's expectation.
    pub fn validate<T: Shareable>(&self, name: &str) -> ShmResult<()> {
        if self.magic != SEGMENT_MAGIC {
            return Err(ShmError::CorruptSegment {
                name: name.to_string(),
                reason: "bad magic".to_string(),
            });
        }

        let expected_hash = type_hash::<T>();
        if self.type_hash != expected_hash
            || self.payload_size as usize != std::mem::size_of::<T>()
        {
            return Err(ShmError::TypeMismatch {
                name: name.to_string(),
                expected_hash,
                found_hash: self.type_hash,
            });
        }

        Ok(())
    }
}

// ─── Typed Access Handles ───────────────────────────────────────────

/// Wait-side handle to a segment payload.
///
/// Grants shared access only; the owning process observes (and, for atomics,
/// consumes wakes from) the payload but never acts as its writing end. The
/// direction split between this type and [`ReadWriteSegment`] is the
/// single-writer-per-direction contract of the trigger protocol.
pub struct ReadOnlySegment<T: Shareable> {
    name: String,
    mmap: MmapMut,
    _payload: PhantomData<T>,
}

impl<T: Shareable> ReadOnlySegment<T> {
    /// Wrap a validated mapping. The provider is the only constructor path;
    /// it has already checked header magic, size, and type hash.
    pub(crate) fn from_mapping(name: String, mmap: MmapMut) -> Self {
        Self {
            name,
            mmap,
            _payload: PhantomData,
        }
    }

    /// Shared reference to the payload.
    pub fn get(&self) -> &T {
        // Offset 64 is aligned for any Shareable payload; validated at attach.
        unsafe { &*(self.mmap.as_ptr().add(SEGMENT_HEADER_SIZE) as *const T) }
    }

    /// Segment name (without namespace prefix).
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Post-side handle to a segment payload.
///
/// The holder is the segment's single writing end. For atomic payloads such
/// as [`crate::BinaryFutex`] all mutation goes through `get()` and interior
/// atomics; `get_mut` exists for plain payload structs and initialization.
pub struct ReadWriteSegment<T: Shareable> {
    name: String,
    mmap: MmapMut,
    _payload: PhantomData<T>,
}

impl<T: Shareable> ReadWriteSegment<T> {
    pub(crate) fn from_mapping(name: String, mmap: MmapMut) -> Self {
        Self {
            name,
            mmap,
            _payload: PhantomData,
        }
    }

    /// Shared reference to the payload.
    pub fn get(&self) -> &T {
        unsafe { &*(self.mmap.as_ptr().add(SEGMENT_HEADER_SIZE) as *const T) }
    }

    /// Exclusive reference to the payload.
    ///
    /// Only sound while no other process writes the payload concurrently;
    /// that is exactly the single-writer contract this handle represents.
    /// Atomic payloads should prefer `get()`.
    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut *(self.mmap.as_mut_ptr().add(SEGMENT_HEADER_SIZE) as *mut T) }
    }

    /// Segment name (without namespace prefix).
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Shareable> std::fmt::Debug for ReadOnlySegment<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlySegment")
            .field("name", &self.name)
            .field("payload_size", &std::mem::size_of::<T>())
            .finish()
    }
}

impl<T: Shareable> std::fmt::Debug for ReadWriteSegment<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriteSegment")
            .field("name", &self.name)
            .field("payload_size", &std::mem::size_of::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futex::BinaryFutex;

    #[test]
    fn header_is_one_cache_line() {
        assert_eq!(std::mem::size_of::<SegmentHeader>(), 64);
        assert_eq!(std::mem::align_of::<SegmentHeader>(), 64);
    }

    #[test]
    fn header_roundtrip_validates() {
        let header = SegmentHeader::new::<BinaryFutex>(4242);
        assert_eq!(header.magic, SEGMENT_MAGIC);
        assert_eq!(header.creator_pid, 4242);
        assert_eq!(header.payload_size, 4);
        assert!(header.validate::<BinaryFutex>("t").is_ok());
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut header = SegmentHeader::new::<BinaryFutex>(1);
        header.magic = *b"NOTAXON\0";
        assert!(matches!(
            header.validate::<BinaryFutex>("t"),
            Err(ShmError::CorruptSegment { .. })
        ));
    }

    #[test]
    fn wrong_payload_type_is_mismatch() {
        #[repr(C)]
        struct Wider {
            _a: u64,
            _b: u64,
        }
        // SAFETY: repr(C), plain integers, zero-valid.
        unsafe impl Shareable for Wider {}

        let header = SegmentHeader::new::<BinaryFutex>(1);
        let err = header.validate::<Wider>("t").unwrap_err();
        assert!(matches!(err, ShmError::TypeMismatch { .. }));
    }

    #[test]
    fn type_hash_distinguishes_layouts() {
        #[repr(C)]
        struct A {
            _x: u32,
        }
        #[repr(C, align(64))]
        struct B {
            _x: u32,
        }
        assert_ne!(type_hash::<A>(), type_hash::<B>());
        assert_eq!(type_hash::<A>(), type_hash::<BinaryFutex>());
    }
}
