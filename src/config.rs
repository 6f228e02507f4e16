//! Parser limits.
//!
//! Declared sizes in a Mach-O header come from memory that may be corrupt.
//! These limits bound what the parser is willing to map before it treats a
//! declaration as malformed. Limits are loaded at startup, never from the
//! crash path.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Upper bound on `sizeofcmds` (1 MiB).
pub const DEFAULT_MAX_LOAD_COMMANDS_SIZE: u64 = 1024 * 1024;
/// Upper bound on `ncmds`.
pub const DEFAULT_MAX_LOAD_COMMANDS: u32 = 4096;
/// Upper bound on `nsyms` in `LC_SYMTAB`.
pub const DEFAULT_MAX_SYMBOLS: u32 = 16 * 1024 * 1024;

/// Errors raised while loading limits.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Resource limits applied while parsing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLimits {
    /// Largest load-command region that will be mapped.
    pub max_load_commands_size: u64,
    /// Largest number of load commands that will be walked.
    pub max_load_commands: u32,
    /// Largest symbol table that will be mapped.
    pub max_symbols: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_load_commands_size: DEFAULT_MAX_LOAD_COMMANDS_SIZE,
            max_load_commands: DEFAULT_MAX_LOAD_COMMANDS,
            max_symbols: DEFAULT_MAX_SYMBOLS,
        }
    }
}

impl ImageLimits {
    /// Parse limits from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read limits from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
