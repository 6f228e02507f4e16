//! Error types for Mach-O image introspection and symbol lookup.
//!
//! Every fallible operation in the core returns [`MachOError`]. The type is
//! `Copy` and carries only static context strings and integers, so building
//! or propagating an error never touches the allocator.

use thiserror::Error;

/// Status domain shared by all fallible operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A requested command, segment, section, symbol or name does not exist.
    NotFound,
    /// The caller supplied an argument outside the accepted range.
    InvalidArgument,
    /// Declared sizes, offsets or counts are inconsistent with the mapped data.
    MalformedInput,
    /// An invariant of this crate was violated.
    Internal,
    /// The memory-mapping primitive could not validate a requested range.
    MemoryAccess,
}

/// Main error type for image parsing and symbolication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MachOError {
    /// Lookup miss
    #[error("Not found: {0}")]
    NotFound(&'static str),

    /// Argument rejected by the callee
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Structural inconsistency in the image
    #[error("Malformed input: {0}")]
    MalformedInput(&'static str),

    /// Truncated structure read at a known offset
    #[error("Truncated at {offset:#x}, needed {needed} bytes")]
    Truncated { offset: usize, needed: usize },

    /// Failed remote mapping
    #[error("Memory access failure at {address:#x} ({length} bytes)")]
    MemoryAccess { address: u64, length: u64 },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl MachOError {
    /// Map the error onto the status domain.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::MalformedInput(_) | Self::Truncated { .. } => ErrorKind::MalformedInput,
            Self::MemoryAccess { .. } => ErrorKind::MemoryAccess,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Reclassify a mapping failure as malformed input.
    ///
    /// Used where a range was derived from sizes declared by the image
    /// itself: if the range cannot be mapped, the declaration is at fault.
    pub(crate) fn into_malformed(self, context: &'static str) -> Self {
        match self {
            Self::MemoryAccess { .. } | Self::Truncated { .. } => Self::MalformedInput(context),
            other => other,
        }
    }
}

/// Result type alias for image operations
pub type Result<T> = std::result::Result<T, MachOError>;
