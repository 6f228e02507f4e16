//! Async-signal-safe Mach-O image introspection and symbolication.
//!
//! Given a task and the header address of one of its loaded images, the
//! crate parses the header and load commands, maps segments and sections
//! through a validating [`Task`] primitive, and resolves instruction
//! addresses to symbol names (and names back to addresses) for crash
//! reports.

/// Parser limits
pub mod config;
/// Error types and status domain
pub mod error;
/// Binary format parsers
pub mod formats;
/// Tracing subscriber setup
pub mod logging;
/// Target memory access
pub mod task;

pub use config::ImageLimits;
pub use error::{ErrorKind, MachOError, Result};
pub use formats::macho::{Image, MappedSegment, SymbolEntry, SymbolTable, SymtabReader};
pub use task::{MemoryObject, SliceTask, SnapshotTask, Task};
