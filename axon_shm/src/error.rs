//! Error types for segment and futex operations

use thiserror::Error;

/// Errors that can occur during segment and futex operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Segment already exists
    #[error("Segment already exists: {name}")]
    AlreadyExists {
        /// Segment name
        name: String,
    },

    /// Segment not found
    #[error("Segment not found: {name}")]
    NotFound {
        /// Segment name
        name: String,
    },

    /// Payload type recorded by the creator does not match the opener's type
    #[error(
        "Type mismatch for segment {name}: expected hash {expected_hash:#010x}, found {found_hash:#010x}"
    )]
    TypeMismatch {
        /// Segment name
        name: String,
        /// Layout hash the opener expects
        expected_hash: u32,
        /// Layout hash recorded in the segment header
        found_hash: u32,
    },

    /// Segment header failed validation
    #[error("Corrupt segment {name}: {reason}")]
    CorruptSegment {
        /// Segment name
        name: String,
        /// What the validation found
        reason: String,
    },

    /// Segment or namespace name rejected before touching the filesystem
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Permission denied
    #[error("Permission denied accessing segment: {name}")]
    PermissionDenied {
        /// Segment name
        name: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
